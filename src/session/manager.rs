use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audio::{AudioCapture, QualityProfile};
use crate::error::CaptureError;

/// Recording session state. Transitions only
/// `Idle -> Recording -> {Paused <-> Recording} -> Stopping -> Idle`;
/// `Stopping` is entered exactly once per session and is always followed by
/// either a transcription hand-off or a resource release, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopping,
}

struct ActiveSession {
    session_id: String,
    output_path: PathBuf,
    started_at: Instant,
    profile: QualityProfile,
}

/// Coordinates the exclusive capture resource with recorder state and the
/// elapsed-time ticker. At most one session is active per manager, and the
/// overlay holds exactly one manager per capture surface (main or modal),
/// so the microphone is never raced for.
pub struct SessionManager {
    capture: Box<dyn AudioCapture>,
    state: RecorderState,
    session: Option<ActiveSession>,
    ticker: Option<JoinHandle<()>>,
}

impl SessionManager {
    pub fn new(capture: Box<dyn AudioCapture>) -> Self {
        Self {
            capture,
            state: RecorderState::Idle,
            session: None,
            ticker: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording | RecorderState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state == RecorderState::Paused
    }

    pub fn supports_pause(&self) -> bool {
        self.capture.supports_pause()
    }

    /// Path of the in-progress capture file, if a session is active.
    pub fn current_file(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.output_path.as_path())
    }

    /// Profile fixed at session start.
    pub fn profile(&self) -> Option<QualityProfile> {
        self.session.as_ref().map(|s| s.profile)
    }

    /// Wall-clock time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.session
            .as_ref()
            .map(|s| s.started_at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Elapsed time rendered as `M:SS` for the status line.
    pub fn format_elapsed(&self) -> String {
        format_elapsed(self.elapsed().as_secs())
    }

    /// Acquire the capture resource and enter `Recording`. On acquisition
    /// failure the manager settles back in `Idle` with nothing held.
    pub async fn start(
        &mut self,
        capture_dir: &Path,
        profile: QualityProfile,
    ) -> Result<(), CaptureError> {
        if self.state != RecorderState::Idle {
            warn!("start() ignored: session already {:?}", self.state);
            return Err(CaptureError::AlreadyRecording);
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let output_path = capture_dir.join(format!("voice_{}.wav", session_id));

        if let Err(e) = self.capture.start(&output_path, profile).await {
            self.capture.release().await;
            self.state = RecorderState::Idle;
            return Err(e);
        }

        info!(
            "Recording session started: {} ({})",
            session_id,
            profile.name()
        );

        self.session = Some(ActiveSession {
            session_id,
            output_path,
            started_at: Instant::now(),
            profile,
        });
        self.state = RecorderState::Recording;

        Ok(())
    }

    /// Pause capture. A no-op (with a warning) when the backend cannot
    /// pause; the displayed state is only changed when the backend did.
    pub async fn pause(&mut self) -> Result<(), CaptureError> {
        if self.state != RecorderState::Recording {
            return Ok(());
        }
        if !self.capture.supports_pause() {
            warn!("pause() ignored: backend '{}' cannot pause", self.capture.name());
            return Ok(());
        }

        self.stop_ticker();
        self.capture.pause().await?;
        self.state = RecorderState::Paused;
        info!("Recording paused at {}", self.format_elapsed());
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<(), CaptureError> {
        if self.state != RecorderState::Paused {
            return Ok(());
        }

        self.capture.resume().await?;
        self.state = RecorderState::Recording;
        info!("Recording resumed");
        Ok(())
    }

    /// Stop capture and return the flushed, closed container file for the
    /// transcription hand-off. The capture resource is released before this
    /// returns, so the upload always sees complete bytes.
    pub async fn stop(&mut self) -> Result<PathBuf, CaptureError> {
        if !self.is_recording() {
            return Err(CaptureError::NotRecording);
        }

        self.state = RecorderState::Stopping;
        self.stop_ticker();

        let result = self.capture.stop().await;
        let session = self.session.take();
        self.state = RecorderState::Idle;

        match result {
            Ok(path) => {
                if let Some(s) = session {
                    info!("Recording session stopped: {}", s.session_id);
                }
                Ok(path)
            }
            Err(e) => {
                self.capture.release().await;
                Err(e)
            }
        }
    }

    /// Discard the in-progress capture without transcribing. Valid from
    /// `Recording` or `Paused`; always lands in `Idle` with nothing held.
    pub async fn cancel(&mut self) {
        if !self.is_recording() {
            return;
        }

        self.stop_ticker();
        self.capture.release().await;

        if let Some(s) = self.session.take() {
            // The backend deletes its own file on release; cover backends
            // that already closed it.
            if s.output_path.exists() {
                if let Err(e) = std::fs::remove_file(&s.output_path) {
                    warn!(
                        "Failed to remove cancelled capture {}: {}",
                        s.output_path.display(),
                        e
                    );
                }
            }
            info!("Recording session cancelled: {}", s.session_id);
        }
        self.state = RecorderState::Idle;
    }

    /// Emit one tick per second while `Recording`. Replaces any previous
    /// ticker; stopped the instant state leaves `Recording`.
    pub fn start_ticker(&mut self, on_tick: impl Fn(u64) + Send + 'static) {
        self.stop_ticker();
        if self.state != RecorderState::Recording {
            return;
        }

        let base = self.elapsed();
        let resumed_at = Instant::now();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick is immediate
            loop {
                interval.tick().await;
                let elapsed = base + resumed_at.elapsed();
                on_tick(elapsed.as_secs());
            }
        });
        self.ticker = Some(handle);
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

/// Render seconds as `M:SS`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

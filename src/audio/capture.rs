use async_trait::async_trait;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use super::quality::QualityProfile;
use crate::error::CaptureError;

/// Audio capture backend.
///
/// Owns the exclusive microphone resource between `start` and
/// `stop`/`release`. `stop` must not return until the container file is
/// flushed and closed, so the caller can hand the path straight to an
/// upload. Platform-specific implementations plug in behind
/// `CaptureFactory`; `SyntheticCapture` serves tests and the CLI driver.
#[async_trait]
pub trait AudioCapture: Send {
    /// Begin encoding to `output` with the given profile.
    async fn start(&mut self, output: &Path, profile: QualityProfile) -> Result<(), CaptureError>;

    /// Whether this backend can pause mid-capture. Callers must check this
    /// before offering a pause control.
    fn supports_pause(&self) -> bool;

    async fn pause(&mut self) -> Result<(), CaptureError>;

    async fn resume(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing. The returned file is flushed and closed.
    async fn stop(&mut self) -> Result<PathBuf, CaptureError>;

    /// Discard the capture without producing a file. Best effort; never fails.
    async fn release(&mut self);

    fn is_capturing(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Capture source selector for the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// Deterministic silence encoder (tests, CLI driver).
    Synthetic,
}

pub struct CaptureFactory;

impl CaptureFactory {
    pub fn create(source: CaptureSource) -> Box<dyn AudioCapture> {
        match source {
            CaptureSource::Synthetic => Box::new(SyntheticCapture::new()),
        }
    }
}

/// Capture backend that encodes silence at the profile's exact parameters
/// into a WAV container. The sample clock runs on wall time, excluding
/// paused spans, so the emitted file's duration matches the elapsed
/// recording time.
pub struct SyntheticCapture {
    active: Option<ActiveCapture>,
}

struct ActiveCapture {
    writer: hound::WavWriter<BufWriter<File>>,
    path: PathBuf,
    profile: QualityProfile,
    segment_started: Option<Instant>,
    recorded: std::time::Duration,
}

impl SyntheticCapture {
    pub fn new() -> Self {
        Self { active: None }
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveCapture {
    /// Fold the running segment into the recorded total.
    fn settle_clock(&mut self) {
        if let Some(started) = self.segment_started.take() {
            self.recorded += started.elapsed();
        }
    }

    fn write_recorded_silence(&mut self) -> Result<(), CaptureError> {
        let samples = (self.recorded.as_secs_f64()
            * self.profile.sample_rate() as f64
            * self.profile.channels() as f64) as usize;
        for _ in 0..samples {
            self.writer
                .write_sample(0i16)
                .map_err(|e| CaptureError::EncoderInit(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AudioCapture for SyntheticCapture {
    async fn start(&mut self, output: &Path, profile: QualityProfile) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let spec = hound::WavSpec {
            channels: profile.channels(),
            sample_rate: profile.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(output, spec)
            .map_err(|e| CaptureError::EncoderInit(e.to_string()))?;

        info!(
            "Capture started: {} ({} Hz, {} ch, {} bps)",
            output.display(),
            profile.sample_rate(),
            profile.channels(),
            profile.bit_rate()
        );

        self.active = Some(ActiveCapture {
            writer,
            path: output.to_path_buf(),
            profile,
            segment_started: Some(Instant::now()),
            recorded: std::time::Duration::ZERO,
        });

        Ok(())
    }

    fn supports_pause(&self) -> bool {
        true
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        let active = self.active.as_mut().ok_or(CaptureError::NotRecording)?;
        active.settle_clock();
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        let active = self.active.as_mut().ok_or(CaptureError::NotRecording)?;
        if active.segment_started.is_none() {
            active.segment_started = Some(Instant::now());
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<PathBuf, CaptureError> {
        let mut active = self.active.take().ok_or(CaptureError::NotRecording)?;
        active.settle_clock();
        active.write_recorded_silence()?;

        let path = active.path.clone();
        active
            .writer
            .finalize()
            .map_err(|e| CaptureError::EncoderInit(e.to_string()))?;

        info!("Capture stopped: {}", path.display());
        Ok(path)
    }

    async fn release(&mut self) {
        if let Some(active) = self.active.take() {
            let path = active.path.clone();
            drop(active);
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove discarded capture {}: {}", path.display(), e);
            }
            info!("Capture released: {}", path.display());
        }
    }

    fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

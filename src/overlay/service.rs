use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::events::{
    FollowUp, OverlayEvent, PointerEvent, RefinementKind, TranscriptTarget,
};
use crate::audio::{AudioCapture, CaptureFactory, CaptureSource, QualityProfile};
use crate::config::SettingsProvider;
use crate::error::PipelineError;
use crate::gesture::{Gesture, GestureClassifier};
use crate::history::HistoryLog;
use crate::pipeline;
use crate::session::{format_elapsed, RecorderState, SessionManager};

/// Upper bound on concurrently in-flight network tasks.
const MAX_INFLIGHT_REQUESTS: usize = 4;

/// The editor panel's state. Owned exclusively by the overlay actor; the
/// panel UI is a read/write projection of this.
#[derive(Debug, Clone, Default)]
pub struct EditorState {
    pub text: String,
    pub is_recording: bool,
    pub is_paused: bool,
    pub is_editor_open: bool,
    /// True while a transcription or refinement is in flight.
    pub is_processing: bool,
    pub status: String,
}

/// Read-only view of the actor's state, for queries.
#[derive(Debug, Clone)]
pub struct EditorSnapshot {
    pub editor: EditorState,
    pub recorder_state: RecorderState,
    pub modal_open: bool,
    pub modal_recording: bool,
    /// Result of the last long-press quick recording, if any.
    pub quick_transcript: Option<String>,
    pub control_position: (i32, i32),
}

/// Factory for capture backends; the voice-edit modal gets its own
/// instance so its resource is independent of the main session's.
pub type CaptureBackendFactory = Box<dyn Fn() -> Box<dyn AudioCapture> + Send>;

/// Nested voice-edit flow, scoped to its modal dialog.
struct VoiceEditModal {
    session: SessionManager,
    original_text: String,
}

/// Handle to a running overlay actor.
pub struct OverlayHandle {
    tx: mpsc::UnboundedSender<OverlayEvent>,
    task: JoinHandle<()>,
}

impl OverlayHandle {
    pub fn sender(&self) -> mpsc::UnboundedSender<OverlayEvent> {
        self.tx.clone()
    }

    pub fn send(&self, event: OverlayEvent) {
        let _ = self.tx.send(event);
    }

    /// Current state. Panics only if the actor task itself panicked.
    pub async fn snapshot(&self) -> EditorSnapshot {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(OverlayEvent::Query(reply_tx));
        reply_rx.await.expect("overlay actor gone")
    }

    pub async fn shutdown(self) {
        let _ = self.tx.send(OverlayEvent::Shutdown);
        let _ = self.task.await;
    }
}

/// The orchestration engine behind the floating control: a single task
/// owning all mutable editor state. Gestures, commands, ticker ticks and
/// pipeline completions all arrive as events; pipeline completions carry
/// the editor epoch from dispatch time, and results that outlived their
/// editor are discarded instead of applied to stale state.
pub struct OverlayService {
    settings: SettingsProvider,
    history: HistoryLog,
    capture_factory: CaptureBackendFactory,

    editor: EditorState,
    epoch: u64,
    classifier: GestureClassifier,
    session: SessionManager,
    modal: Option<VoiceEditModal>,
    quick_transcript: Option<String>,
    /// Path of the most recent capture, for the history audio copy.
    last_capture: Option<PathBuf>,

    tx: mpsc::UnboundedSender<OverlayEvent>,
    rx: mpsc::UnboundedReceiver<OverlayEvent>,
    net_pool: Arc<Semaphore>,
    long_press_seq: u64,
    long_press_timer: Option<JoinHandle<()>>,
}

impl OverlayService {
    /// Spawn the actor with the default (synthetic) capture backend.
    pub fn spawn(settings: SettingsProvider, history: HistoryLog) -> OverlayHandle {
        Self::spawn_with_capture(
            settings,
            history,
            Box::new(|| CaptureFactory::create(CaptureSource::Synthetic)),
        )
    }

    pub fn spawn_with_capture(
        settings: SettingsProvider,
        history: HistoryLog,
        capture_factory: CaptureBackendFactory,
    ) -> OverlayHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let position = {
            let s = settings.snapshot();
            (s.overlay.button_x, s.overlay.button_y)
        };

        let service = Self {
            session: SessionManager::new(capture_factory()),
            classifier: GestureClassifier::new(position.0, position.1),
            editor: EditorState {
                status: "Ready".to_string(),
                ..EditorState::default()
            },
            epoch: 0,
            modal: None,
            quick_transcript: None,
            last_capture: None,
            settings,
            history,
            capture_factory,
            tx: tx.clone(),
            rx,
            net_pool: Arc::new(Semaphore::new(MAX_INFLIGHT_REQUESTS)),
            long_press_seq: 0,
            long_press_timer: None,
        };

        let task = tokio::spawn(service.run());
        OverlayHandle { tx, task }
    }

    async fn run(mut self) {
        info!("Overlay service started");

        while let Some(event) = self.rx.recv().await {
            match event {
                OverlayEvent::Pointer(p) => self.on_pointer(p).await,
                OverlayEvent::OpenEditor => self.open_editor().await,
                OverlayEvent::CloseEditor => self.close_editor().await,
                OverlayEvent::StartRecording => self.start_recording().await,
                OverlayEvent::PauseRecording => self.pause_recording().await,
                OverlayEvent::ResumeRecording => self.resume_recording().await,
                OverlayEvent::StopRecording => {
                    self.stop_and_transcribe(TranscriptTarget::Editor, None).await
                }
                OverlayEvent::CancelRecording => self.cancel_recording().await,
                OverlayEvent::ClearText => self.clear_text(),
                OverlayEvent::SetText(text) => self.editor.text = text,
                OverlayEvent::Improve => {
                    if self.session.is_recording() {
                        self.stop_and_transcribe(
                            TranscriptTarget::Editor,
                            Some(FollowUp::Improve),
                        )
                        .await;
                    } else {
                        self.begin_improve();
                    }
                }
                OverlayEvent::VoiceEdit => {
                    if self.session.is_recording() {
                        self.stop_and_transcribe(
                            TranscriptTarget::Editor,
                            Some(FollowUp::VoiceEdit),
                        )
                        .await;
                    } else {
                        self.begin_voice_edit();
                    }
                }
                OverlayEvent::TakeText(reply) => {
                    if self.session.is_recording() {
                        self.stop_and_transcribe(
                            TranscriptTarget::Editor,
                            Some(FollowUp::Deliver(reply)),
                        )
                        .await;
                    } else {
                        self.deliver_text(reply).await;
                    }
                }
                OverlayEvent::ModalRecord => self.modal_record().await,
                OverlayEvent::ModalStop => self.modal_stop().await,
                OverlayEvent::ModalCancel => self.modal_cancel().await,
                OverlayEvent::Tick(secs) => self.on_tick(secs),
                OverlayEvent::LongPressElapsed { seq } => self.on_long_press(seq).await,
                OverlayEvent::TranscriptionDone {
                    epoch,
                    target,
                    result,
                    follow_up,
                } => self.on_transcription_done(epoch, target, result, follow_up).await,
                OverlayEvent::RefinementDone {
                    epoch,
                    target,
                    result,
                } => self.on_refinement_done(epoch, target, result),
                OverlayEvent::Query(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                OverlayEvent::Shutdown => break,
            }
        }

        // Teardown: nothing may keep the microphone.
        self.disarm_long_press();
        if self.session.is_recording() {
            self.session.cancel().await;
        }
        if let Some(mut modal) = self.modal.take() {
            modal.session.cancel().await;
        }
        info!("Overlay service stopped");
    }

    fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            editor: self.editor.clone(),
            recorder_state: self.session.state(),
            modal_open: self.modal.is_some(),
            modal_recording: self
                .modal
                .as_ref()
                .map(|m| m.session.is_recording())
                .unwrap_or(false),
            quick_transcript: self.quick_transcript.clone(),
            control_position: self.classifier.control_position(),
        }
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    async fn on_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { x, y } => {
                self.disarm_long_press();
                let window = self.classifier.on_down(x, y);
                self.long_press_seq += 1;
                self.arm_long_press(window, self.long_press_seq);
            }
            PointerEvent::Move { x, y } => {
                // A drag means the classifier disarmed itself; the timer
                // task is aborted too so it cannot even post a stale fire.
                if let Some(Gesture::Drag { .. }) = self.classifier.on_move(x, y) {
                    self.disarm_long_press();
                }
            }
            PointerEvent::Up => {
                self.disarm_long_press();
                match self.classifier.on_up() {
                    Some(Gesture::Tap) => self.open_editor().await,
                    Some(Gesture::LongPressRelease) => {
                        // If the quick recording never started (or failed to
                        // start), there is nothing to stop or transcribe.
                        if self.session.is_recording() {
                            self.stop_and_transcribe(TranscriptTarget::Quick, None).await
                        }
                    }
                    Some(Gesture::DragEnd { x, y }) => {
                        self.settings.save_button_position(x, y);
                        info!("Button position saved: ({}, {})", x, y);
                    }
                    _ => {}
                }
            }
            PointerEvent::Cancel => {
                self.disarm_long_press();
                if let Some(Gesture::CancelRecording) = self.classifier.on_cancel() {
                    self.cancel_recording().await;
                }
            }
        }
    }

    fn arm_long_press(&mut self, window: Duration, seq: u64) {
        let tx = self.tx.clone();
        self.long_press_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = tx.send(OverlayEvent::LongPressElapsed { seq });
        }));
    }

    fn disarm_long_press(&mut self) {
        if let Some(timer) = self.long_press_timer.take() {
            timer.abort();
        }
    }

    async fn on_long_press(&mut self, seq: u64) {
        if seq != self.long_press_seq {
            return; // stale timer from an earlier gesture
        }
        // Quick recording only exists while the editor is closed. Leave the
        // window unconsumed otherwise, so the release stays a plain tap.
        if self.editor.is_editor_open || self.session.is_recording() {
            return;
        }
        if self.classifier.long_press_elapsed().is_none() {
            return;
        }
        self.start_recording().await;
    }

    // ------------------------------------------------------------------
    // Editor lifecycle
    // ------------------------------------------------------------------

    async fn open_editor(&mut self) {
        self.editor.is_editor_open = true;
        let auto_start = self.settings.snapshot().overlay.auto_start_recording;
        if auto_start && !self.session.is_recording() {
            self.start_recording().await;
        }
    }

    /// Close the editor: save the accumulated text to history, drop any
    /// in-progress capture without transcribing, and invalidate pending
    /// pipeline results so they cannot land on the next editor session.
    async fn close_editor(&mut self) {
        if !self.editor.text.trim().is_empty() {
            self.save_to_history();
            self.editor.text.clear();
        }

        if self.session.is_recording() {
            self.session.cancel().await;
        }
        // A voice-edit modal cannot outlive its editor.
        if let Some(mut modal) = self.modal.take() {
            modal.session.cancel().await;
        }

        self.epoch += 1;
        self.editor.is_editor_open = false;
        self.editor.is_recording = false;
        self.editor.is_paused = false;
        self.editor.is_processing = false;
        self.editor.status = "Ready".to_string();
    }

    fn save_to_history(&mut self) {
        let audio = self.last_capture.take();
        match self.history.append(&self.editor.text, audio.as_deref()) {
            Ok(Some(_)) => info!("Editor text saved to history"),
            Ok(None) => {}
            Err(e) => error!("Failed to save history entry: {}", e),
        }
    }

    fn clear_text(&mut self) {
        if !self.editor.text.trim().is_empty() {
            self.save_to_history();
        }
        self.editor.text.clear();
        self.editor.status = "Text cleared and saved to history".to_string();
    }

    async fn deliver_text(&mut self, reply: oneshot::Sender<String>) {
        let _ = reply.send(self.editor.text.clone());
        self.close_editor().await;
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    async fn start_recording(&mut self) {
        let settings = self.settings.snapshot();
        let profile = QualityProfile::from_name(&settings.audio.quality);

        match self.session.start(&settings.audio.capture_dir, profile).await {
            Ok(()) => {
                self.editor.is_recording = true;
                self.editor.is_paused = false;
                self.last_capture = self.session.current_file().map(|p| p.to_path_buf());
                self.editor.status = "Recording... 0:00".to_string();
                self.start_ticker();
            }
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.reset_after_error(&format!("Error: {}", e));
            }
        }
    }

    fn start_ticker(&mut self) {
        let tx = self.tx.clone();
        self.session.start_ticker(move |secs| {
            let _ = tx.send(OverlayEvent::Tick(secs));
        });
    }

    fn on_tick(&mut self, secs: u64) {
        // Ticks race with state changes; only a live recording updates the
        // status line.
        if self.session.state() == RecorderState::Recording {
            self.editor.status = format!("Recording... {}", format_elapsed(secs));
        }
    }

    async fn pause_recording(&mut self) {
        if !self.session.supports_pause() {
            return;
        }
        if let Err(e) = self.session.pause().await {
            self.reset_after_error(&format!("Error: {}", e));
            return;
        }
        if self.session.is_paused() {
            self.editor.is_paused = true;
            self.editor.status = format!("Paused at {}", self.session.format_elapsed());
        }
    }

    async fn resume_recording(&mut self) {
        if let Err(e) = self.session.resume().await {
            self.reset_after_error(&format!("Error: {}", e));
            return;
        }
        if self.session.state() == RecorderState::Recording {
            self.editor.is_paused = false;
            self.editor.status = format!("Recording... {}", self.session.format_elapsed());
            self.start_ticker();
        }
    }

    async fn cancel_recording(&mut self) {
        self.session.cancel().await;
        self.last_capture = None;
        self.editor.is_recording = false;
        self.editor.is_paused = false;
        self.editor.status = "Ready".to_string();
    }

    /// Stop the session and hand the flushed file to the transcription
    /// pipeline. The capture resource is released before the upload task
    /// is spawned.
    async fn stop_and_transcribe(&mut self, target: TranscriptTarget, follow_up: Option<FollowUp>) {
        let path = match self.session.stop().await {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to stop recording: {}", e);
                self.reset_after_error(&format!("Error stopping: {}", e));
                return;
            }
        };

        self.editor.is_recording = false;
        self.editor.is_paused = false;
        self.editor.is_processing = true;
        self.editor.status = "Transcribing...".to_string();

        self.spawn_transcription(path, target, follow_up);
    }

    /// Upload on a pooled background task; the temp file is deleted after
    /// the call, success or failure, before the completion event posts.
    fn spawn_transcription(
        &self,
        path: PathBuf,
        target: TranscriptTarget,
        follow_up: Option<FollowUp>,
    ) {
        let settings = self.settings.snapshot();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let pool = Arc::clone(&self.net_pool);

        tokio::spawn(async move {
            let _permit = pool.acquire_owned().await.ok();
            let result = pipeline::transcribe(&settings, &path).await;
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove temp audio {}: {}", path.display(), e);
            }
            let _ = tx.send(OverlayEvent::TranscriptionDone {
                epoch,
                target,
                result,
                follow_up,
            });
        });
    }

    async fn on_transcription_done(
        &mut self,
        epoch: u64,
        target: TranscriptTarget,
        result: Result<String, PipelineError>,
        follow_up: Option<FollowUp>,
    ) {
        if epoch != self.epoch {
            info!("Discarding transcription result for a closed editor");
            return;
        }

        match target {
            TranscriptTarget::Editor => {
                self.editor.is_processing = false;
                match result {
                    Ok(text) => {
                        self.append_transcript(&text);
                        self.editor.status = "Transcribed".to_string();
                    }
                    Err(e) => {
                        error!("Transcription failed: {}", e);
                        self.editor.status = format!("Transcription failed: {}", e);
                    }
                }
                // The continuation runs exactly once, after cleanup,
                // regardless of outcome.
                match follow_up {
                    Some(FollowUp::Improve) => self.begin_improve(),
                    Some(FollowUp::VoiceEdit) => self.begin_voice_edit(),
                    Some(FollowUp::Deliver(reply)) => self.deliver_text(reply).await,
                    None => {}
                }
            }
            TranscriptTarget::Quick => {
                self.editor.is_processing = false;
                match result {
                    Ok(text) => {
                        self.quick_transcript = Some(text);
                        self.editor.status = "Transcribed".to_string();
                    }
                    Err(e) => {
                        error!("Quick transcription failed: {}", e);
                        self.editor.status = format!("Transcription failed: {}", e);
                    }
                }
            }
            TranscriptTarget::Instructions => match result {
                Ok(instructions) => self.apply_voice_edit(instructions),
                Err(e) => {
                    error!("Edit-instruction transcription failed: {}", e);
                    self.editor.is_processing = false;
                    self.editor.status = format!("Transcription failed: {}", e);
                }
            },
        }
    }

    /// Append a transcript after any prior text, inserting a separating
    /// newline unless the text already ends in one.
    fn append_transcript(&mut self, transcript: &str) {
        if !self.editor.text.is_empty() && !self.editor.text.ends_with('\n') {
            self.editor.text.push('\n');
        }
        self.editor.text.push_str(transcript);
    }

    fn reset_after_error(&mut self, status: &str) {
        self.editor.is_recording = false;
        self.editor.is_paused = false;
        self.editor.is_processing = false;
        self.editor.status = status.to_string();
    }

    // ------------------------------------------------------------------
    // Refinement
    // ------------------------------------------------------------------

    fn begin_improve(&mut self) {
        let text = self.editor.text.trim().to_string();
        if text.is_empty() {
            self.editor.status = "No text to improve".to_string();
            return;
        }

        self.editor.is_processing = true;
        self.editor.status = "Improving text...".to_string();

        let settings = self.settings.snapshot();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let pool = Arc::clone(&self.net_pool);
        tokio::spawn(async move {
            let _permit = pool.acquire_owned().await.ok();
            let result = pipeline::improve(&settings, &text).await;
            let _ = tx.send(OverlayEvent::RefinementDone {
                epoch,
                target: RefinementKind::Improve,
                result,
            });
        });
    }

    fn on_refinement_done(
        &mut self,
        epoch: u64,
        target: RefinementKind,
        result: Result<String, PipelineError>,
    ) {
        if epoch != self.epoch {
            info!("Discarding refinement result for a closed editor");
            return;
        }
        self.editor.is_processing = false;

        match (target, result) {
            (RefinementKind::Improve, Ok(text)) => {
                self.editor.text = text;
                self.editor.status = "Text improved".to_string();
            }
            (RefinementKind::Improve, Err(e)) => {
                error!("Improvement failed: {}", e);
                self.editor.status = format!("Improvement failed: {}", e);
            }
            (RefinementKind::VoiceEdit, Ok(text)) => {
                self.editor.text = text;
                self.modal = None;
                self.editor.status = "Voice edit applied".to_string();
            }
            (RefinementKind::VoiceEdit, Err(e)) => {
                // The modal stays open so the user can retry or cancel.
                error!("Voice edit failed: {}", e);
                self.editor.status = format!("Edit failed: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Voice-edit modal
    // ------------------------------------------------------------------

    fn begin_voice_edit(&mut self) {
        let original = self.editor.text.trim().to_string();
        if original.is_empty() {
            self.editor.status = "No text to edit".to_string();
            return;
        }
        if self.settings.snapshot().transcription.api_key.trim().is_empty() {
            self.editor.status = "Set the API key in settings first".to_string();
            return;
        }

        self.modal = Some(VoiceEditModal {
            session: SessionManager::new((self.capture_factory)()),
            original_text: original,
        });
        self.editor.status = "Speak your edit instructions".to_string();
    }

    async fn modal_record(&mut self) {
        // The microphone is exclusive: the modal may only record while the
        // main session is settled.
        if self.session.is_recording() {
            warn!("Modal record refused: main session still active");
            return;
        }
        let settings = self.settings.snapshot();
        let profile = QualityProfile::from_name(&settings.audio.quality);

        let Some(modal) = self.modal.as_mut() else {
            return;
        };
        match modal.session.start(&settings.audio.capture_dir, profile).await {
            Ok(()) => {
                self.editor.status = "Recording edit instructions...".to_string();
            }
            Err(e) => {
                error!("Failed to start modal recording: {}", e);
                self.editor.status = format!("Error: {}", e);
            }
        }
    }

    async fn modal_stop(&mut self) {
        let Some(modal) = self.modal.as_mut() else {
            return;
        };
        match modal.session.stop().await {
            Ok(path) => {
                self.editor.is_processing = true;
                self.editor.status = "Transcribing edit instructions...".to_string();
                self.spawn_transcription(path, TranscriptTarget::Instructions, None);
            }
            Err(e) => {
                error!("Failed to stop modal recording: {}", e);
                self.editor.status = format!("Error stopping: {}", e);
            }
        }
    }

    /// Cancelling the modal mid-recording must release its capture
    /// resource; the editor text is untouched.
    async fn modal_cancel(&mut self) {
        if let Some(mut modal) = self.modal.take() {
            if modal.session.is_recording() {
                modal.session.cancel().await;
            }
        }
        self.editor.is_processing = false;
        self.editor.status = "Ready".to_string();
    }

    fn apply_voice_edit(&mut self, instructions: String) {
        let Some(modal) = self.modal.as_ref() else {
            return;
        };
        self.editor.status = "Applying edits...".to_string();

        let original = modal.original_text.clone();
        let settings = self.settings.snapshot();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let pool = Arc::clone(&self.net_pool);
        tokio::spawn(async move {
            let _permit = pool.acquire_owned().await.ok();
            let result = pipeline::apply_voice_edit(&settings, &original, &instructions).await;
            let _ = tx.send(OverlayEvent::RefinementDone {
                epoch,
                target: RefinementKind::VoiceEdit,
                result,
            });
        });
    }
}

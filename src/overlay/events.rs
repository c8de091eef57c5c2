use tokio::sync::oneshot;

use crate::error::PipelineError;

/// Raw pointer input scoped to the floating control's touch surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down { x: i32, y: i32 },
    Move { x: i32, y: i32 },
    Up,
    Cancel,
}

/// Where a finished transcription is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptTarget {
    /// Append to the editor text.
    Editor,
    /// Long-press quick recording; delivered without opening the editor.
    Quick,
    /// Edit instructions for the voice-edit modal.
    Instructions,
}

/// Work to run after an implicit stop-and-transcribe has appended the
/// in-flight utterance. Expressed as data so the actor resumes it as
/// ordinary sequential code; it runs exactly once, success or failure.
#[derive(Debug)]
pub enum FollowUp {
    /// Run the improve refinement on the now-current text.
    Improve,
    /// Open the voice-edit modal for the now-current text.
    VoiceEdit,
    /// Hand the accumulated text to the caller and close the editor.
    Deliver(oneshot::Sender<String>),
}

/// Everything the overlay actor reacts to. External callers send input and
/// command events; timers and pipeline tasks post the rest back into the
/// loop themselves.
#[derive(Debug)]
pub enum OverlayEvent {
    Pointer(PointerEvent),

    OpenEditor,
    CloseEditor,
    StartRecording,
    PauseRecording,
    ResumeRecording,
    StopRecording,
    CancelRecording,
    ClearText,
    SetText(String),
    Improve,
    VoiceEdit,
    /// Stop-and-transcribe if needed, then hand over the text and close.
    TakeText(oneshot::Sender<String>),

    ModalRecord,
    ModalStop,
    ModalCancel,

    /// Observe current state (tests, status surfaces).
    Query(oneshot::Sender<super::service::EditorSnapshot>),
    Shutdown,

    // Internal: timers and pipeline completions.
    Tick(u64),
    LongPressElapsed {
        seq: u64,
    },
    TranscriptionDone {
        epoch: u64,
        target: TranscriptTarget,
        result: Result<String, PipelineError>,
        follow_up: Option<FollowUp>,
    },
    RefinementDone {
        epoch: u64,
        target: RefinementKind,
        result: Result<String, PipelineError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementKind {
    Improve,
    VoiceEdit,
}

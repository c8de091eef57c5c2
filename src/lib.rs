pub mod audio;
pub mod config;
pub mod error;
pub mod gesture;
pub mod history;
pub mod overlay;
pub mod pipeline;
pub mod session;

pub use audio::{AudioCapture, CaptureFactory, CaptureSource, QualityProfile, SyntheticCapture};
pub use config::{Settings, SettingsProvider};
pub use error::{CaptureError, PipelineError};
pub use gesture::{Gesture, GestureClassifier};
pub use history::{HistoryEntry, HistoryLog};
pub use overlay::{
    EditorSnapshot, EditorState, OverlayEvent, OverlayHandle, OverlayService, PointerEvent,
    TranscriptTarget,
};
pub use session::{RecorderState, SessionManager};

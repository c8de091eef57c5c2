//! The overlay orchestration actor and its event vocabulary.

pub mod events;
pub mod service;

pub use events::{FollowUp, OverlayEvent, PointerEvent, RefinementKind, TranscriptTarget};
pub use service::{EditorSnapshot, EditorState, OverlayHandle, OverlayService};

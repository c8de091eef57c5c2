//! Asynchronous dispatchers for the two remote services
//!
//! `transcribe` uploads a captured audio container to the selected
//! speech-to-text backend; `refine` runs improve / voice-edit text rewrites
//! through the completion service. Neither touches editor state: results
//! travel back to the overlay actor as events.

pub mod refine;
pub mod transcribe;

pub use refine::{apply_voice_edit, improve};
pub use transcribe::{extract_text, transcribe, BackendMode, DIRECT_MODEL};

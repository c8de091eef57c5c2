//! Recording session management
//!
//! The `SessionManager` state machine coordinates the exclusive capture
//! resource with recorder state and the once-per-second elapsed ticker.

mod manager;

pub use manager::{format_elapsed, RecorderState, SessionManager};

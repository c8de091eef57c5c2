//! Append-only transcription history
//!
//! Structured entries at the core, the original's `|||` / `###ENTRY###`
//! blob format at the store boundary.

mod entry;
mod log;

pub use entry::{parse_log, serialize_log, HistoryEntry, ENTRY_SEPARATOR, FIELD_SEPARATOR};
pub use log::HistoryLog;

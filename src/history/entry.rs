use serde::{Deserialize, Serialize};

/// Separator written between records in the persisted blob.
pub const ENTRY_SEPARATOR: &str = "\n###ENTRY###\n";

/// Separator between the three fields of one record.
pub const FIELD_SEPARATOR: &str = "|||";

/// One transcription saved to history. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Local time, second precision: `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,

    /// The saved transcript text. May contain anything except the entry
    /// separator itself.
    pub text: String,

    /// Absolute path of the retained audio copy; empty if the copy failed
    /// or there was no audio.
    pub audio_path: String,
}

impl HistoryEntry {
    /// Wire form of one record, without the entry separator.
    pub fn serialize(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.timestamp,
            self.text,
            self.audio_path,
            sep = FIELD_SEPARATOR
        )
    }

    /// Parse one record. The field split is limited to three parts so
    /// `|||` embedded in the text cannot swallow the audio field; records
    /// with fewer than two fields are rejected.
    pub fn parse(record: &str) -> Option<Self> {
        let record = record.trim();
        if record.is_empty() {
            return None;
        }

        let mut parts = record.splitn(3, FIELD_SEPARATOR);
        let timestamp = parts.next()?.to_string();
        let text = parts.next()?.to_string();
        let audio_path = parts.next().unwrap_or("").to_string();

        Some(Self {
            timestamp,
            text,
            audio_path,
        })
    }
}

/// Render the full log blob, newest first. Byte-compatible with the
/// original format: each record followed by the entry separator, no outer
/// envelope.
pub fn serialize_log(entries: &[HistoryEntry]) -> String {
    let mut blob = String::new();
    for entry in entries {
        blob.push_str(&entry.serialize());
        blob.push_str(ENTRY_SEPARATOR);
    }
    blob
}

/// Parse a full log blob into entries, newest first. Unparseable records
/// are skipped.
pub fn parse_log(blob: &str) -> Vec<HistoryEntry> {
    blob.split(ENTRY_SEPARATOR)
        .filter_map(HistoryEntry::parse)
        .collect()
}

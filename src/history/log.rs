use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::entry::{parse_log, serialize_log, HistoryEntry};
use crate::config::HistorySettings;
use crate::error::PipelineError;

/// Append-only history of saved transcriptions, persisted as a single blob
/// file in the original wire format. Every operation is a whole-blob
/// read-modify-write, so quick successive mutations cannot lose updates.
#[derive(Clone)]
pub struct HistoryLog {
    log_path: PathBuf,
    audio_dir: PathBuf,
    purge_audio_on_clear: bool,
}

impl HistoryLog {
    pub fn new(settings: &HistorySettings) -> Result<Self, PipelineError> {
        fs::create_dir_all(&settings.audio_dir).map_err(|e| {
            PipelineError::Resource(format!(
                "failed to create history folder {}: {}",
                settings.audio_dir.display(),
                e
            ))
        })?;
        if let Some(parent) = settings.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::Resource(format!("failed to create log dir: {}", e)))?;
            }
        }

        Ok(Self {
            log_path: settings.log_path.clone(),
            audio_dir: settings.audio_dir.clone(),
            purge_audio_on_clear: settings.purge_audio_on_clear,
        })
    }

    /// Save a transcript, retaining a copy of its audio when one exists.
    /// Empty text is a no-op. An audio copy failure degrades to an entry
    /// with an empty audio reference; the text is never lost to it.
    pub fn append(
        &self,
        text: &str,
        audio: Option<&Path>,
    ) -> Result<Option<HistoryEntry>, PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let now = Local::now();
        let entry = HistoryEntry {
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            text: text.to_string(),
            audio_path: self.retain_audio(audio, &now),
        };

        let blob = self.read_blob();
        // Prepend: newest first, matching the original concatenation.
        let new_blob = format!("{}{}", serialize_log(std::slice::from_ref(&entry)), blob);
        self.write_blob(&new_blob)?;

        info!("History entry saved ({} chars)", entry.text.len());
        Ok(Some(entry))
    }

    /// Entries newest-first, optionally filtered by a case-insensitive
    /// substring match on the text.
    pub fn list(&self, filter: Option<&str>) -> Vec<HistoryEntry> {
        let entries = parse_log(&self.read_blob());
        match filter.map(|f| f.to_lowercase()) {
            Some(query) if !query.is_empty() => entries
                .into_iter()
                .filter(|e| e.text.to_lowercase().contains(&query))
                .collect(),
            _ => entries,
        }
    }

    /// Remove the first entry whose three fields all match, along with its
    /// referenced audio file. Identical twin entries lose one copy per
    /// call, as the original's byte-equality removal did. Returns whether
    /// an entry was removed.
    pub fn delete(&self, entry: &HistoryEntry) -> Result<bool, PipelineError> {
        let mut entries = parse_log(&self.read_blob());
        let position = entries.iter().position(|e| e == entry);

        let Some(position) = position else {
            return Ok(false);
        };
        let removed = entries.remove(position);
        self.write_blob(&serialize_log(&entries))?;

        if !removed.audio_path.is_empty() {
            let audio = Path::new(&removed.audio_path);
            if audio.exists() {
                if let Err(e) = fs::remove_file(audio) {
                    warn!("Failed to delete history audio {}: {}", audio.display(), e);
                }
            }
        }

        Ok(true)
    }

    /// Empty the log. Referenced audio files are only removed when
    /// `purge_audio_on_clear` is set; the default keeps them, preserving
    /// the original's behavior.
    pub fn clear(&self) -> Result<(), PipelineError> {
        if self.purge_audio_on_clear {
            for entry in parse_log(&self.read_blob()) {
                if entry.audio_path.is_empty() {
                    continue;
                }
                let audio = Path::new(&entry.audio_path);
                if audio.exists() {
                    if let Err(e) = fs::remove_file(audio) {
                        warn!("Failed to purge history audio {}: {}", audio.display(), e);
                    }
                }
            }
        }

        self.write_blob("")?;
        info!("History cleared");
        Ok(())
    }

    /// Copy the capture into the history folder under a collision-resistant
    /// timestamped name. Returns the stored path, or empty on any failure.
    fn retain_audio(&self, audio: Option<&Path>, now: &chrono::DateTime<Local>) -> String {
        let Some(audio) = audio else {
            return String::new();
        };
        if !audio.exists() {
            return String::new();
        }

        let ext = audio
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("wav");
        let dest = self.audio_dir.join(format!(
            "recording_{}.{}",
            now.format("%Y-%m-%d_%H-%M-%S%.3f").to_string().replace('.', "-"),
            ext
        ));

        match fs::copy(audio, &dest) {
            Ok(_) => dest.display().to_string(),
            Err(e) => {
                warn!(
                    "Failed to copy audio into history ({} -> {}): {}",
                    audio.display(),
                    dest.display(),
                    e
                );
                String::new()
            }
        }
    }

    fn read_blob(&self) -> String {
        fs::read_to_string(&self.log_path).unwrap_or_default()
    }

    fn write_blob(&self, blob: &str) -> Result<(), PipelineError> {
        fs::write(&self.log_path, blob).map_err(|e| {
            PipelineError::Resource(format!(
                "failed to write history log {}: {}",
                self.log_path.display(),
                e
            ))
        })
    }
}

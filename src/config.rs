use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Default chat-completion endpoint for text refinement.
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";

/// All user-facing settings. Pipelines never read these directly; they
/// receive an owned snapshot taken at dispatch time (see `SettingsProvider`),
/// so a mode or key change applies to the next operation, not a running one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub transcription: TranscriptionSettings,
    pub completion: CompletionSettings,
    pub audio: AudioSettings,
    pub overlay: OverlaySettings,
    pub history: HistorySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Backend selection: "api" (direct) or "firebase" (mediated).
    pub mode: String,

    /// User-configured speech-to-text endpoint (direct mode).
    pub api_url: String,

    /// Bearer key for the direct endpoint and the completion service.
    pub api_key: String,

    /// Fixed intermediary function URL (mediated mode).
    pub function_url: String,

    /// Model id sent to the mediated backend.
    pub model: String,

    /// Optional transcription instructions (mediated mode, omitted if empty).
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Chat-completion endpoint for improve / voice-edit.
    pub url: String,

    /// Completion model id.
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Quality preset name: "Low", "Medium" or "High".
    pub quality: String,

    /// Directory for in-progress capture files.
    pub capture_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Auto-start recording when the editor opens.
    pub auto_start_recording: bool,

    /// Last persisted floating-button position.
    pub button_x: i32,
    pub button_y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Path of the history log blob.
    pub log_path: PathBuf,

    /// Folder that keeps copies of transcribed audio.
    pub audio_dir: PathBuf,

    /// Whether `clear()` also removes referenced audio files. The original
    /// behavior leaves them behind, so this defaults to false.
    pub purge_audio_on_clear: bool,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            mode: "api".to_string(),
            api_url: String::new(),
            api_key: String::new(),
            function_url: String::new(),
            model: "whisper-1".to_string(),
            prompt: String::new(),
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_COMPLETION_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            quality: "Low".to_string(),
            capture_dir: std::env::temp_dir(),
        }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            auto_start_recording: true,
            button_x: 50,
            button_y: 200,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("history.log"),
            audio_dir: PathBuf::from("recording_history"),
            purge_audio_on_clear: false,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Single owned configuration source. Components hold a clone of the
/// provider and take read-only snapshots at call time.
#[derive(Clone)]
pub struct SettingsProvider {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsProvider {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Current settings, cloned. Taken once per pipeline dispatch.
    pub fn snapshot(&self) -> Settings {
        self.inner.read().expect("settings lock poisoned").clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut guard = self.inner.write().expect("settings lock poisoned");
        f(&mut guard);
    }

    /// Persist the floating-button position after a completed drag.
    pub fn save_button_position(&self, x: i32, y: i32) {
        self.update(|s| {
            s.overlay.button_x = x;
            s.overlay.button_y = y;
        });
    }
}

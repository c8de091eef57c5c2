use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::Settings;
use crate::error::PipelineError;

/// Model id sent to the direct backend; not user-selectable there.
pub const DIRECT_MODEL: &str = "whisper-1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Which remote transcription service handles a request. Decided from the
/// settings snapshot at dispatch time, so flipping the mode between
/// recordings takes effect on the next transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// User-configured speech-to-text endpoint, called with the user's key.
    Direct,
    /// Fixed intermediary function URL that hides the key from the client.
    Mediated,
}

impl BackendMode {
    pub fn from_settings(mode: &str) -> Self {
        if mode.eq_ignore_ascii_case("firebase") {
            Self::Mediated
        } else {
            Self::Direct
        }
    }
}

/// Upload a captured audio file and return its transcript.
///
/// Configuration problems are detected here, before any network I/O.
/// Network and protocol failures arrive through the returned error; the
/// caller owns editor-state rollback and temp-file cleanup.
pub async fn transcribe(settings: &Settings, audio_path: &Path) -> Result<String, PipelineError> {
    let mode = BackendMode::from_settings(&settings.transcription.mode);
    info!("Dispatching transcription ({:?}): {}", mode, audio_path.display());

    match mode {
        BackendMode::Direct => transcribe_direct(settings, audio_path).await,
        BackendMode::Mediated => transcribe_mediated(settings, audio_path).await,
    }
}

async fn transcribe_direct(settings: &Settings, audio_path: &Path) -> Result<String, PipelineError> {
    let url = settings.transcription.api_url.trim();
    let key = settings.transcription.api_key.trim();
    if url.is_empty() || key.is_empty() {
        return Err(PipelineError::Config(
            "transcription endpoint URL and API key must be set".to_string(),
        ));
    }

    let form = Form::new()
        .text("model", DIRECT_MODEL)
        .text("response_format", "json")
        .part("file", audio_part(audio_path).await?);

    let client = http_client()?;
    let response = client
        .post(url)
        .bearer_auth(key)
        .multipart(form)
        .send()
        .await
        .map_err(|e| PipelineError::network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::network(e.to_string()))?;

    if !status.is_success() {
        return Err(PipelineError::http(status.as_u16(), body));
    }

    extract_text(&body)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PipelineError::Protocol("no transcription found in response".to_string()))
}

async fn transcribe_mediated(
    settings: &Settings,
    audio_path: &Path,
) -> Result<String, PipelineError> {
    let url = settings.transcription.function_url.trim();
    if url.is_empty() {
        return Err(PipelineError::Config(
            "mediated function URL must be set".to_string(),
        ));
    }

    let mut form = Form::new().text("model", settings.transcription.model.clone());
    let prompt = settings.transcription.prompt.trim();
    if !prompt.is_empty() {
        form = form.text("prompt", prompt.to_string());
    }
    form = form.part("file", audio_part(audio_path).await?);

    let client = http_client()?;
    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| PipelineError::network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::network(e.to_string()))?;

    if !status.is_success() {
        return Err(PipelineError::http(status.as_u16(), body));
    }

    let json: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| PipelineError::Protocol(format!("invalid JSON response: {}", e)))?;

    if let Some(error) = json.get("error").and_then(|v| v.as_str()) {
        return Err(PipelineError::network(format!("backend error: {}", error)));
    }
    match json.get("text").and_then(|v| v.as_str()) {
        Some(text) => Ok(text.to_string()),
        None => Err(PipelineError::Protocol(
            "response carries neither text nor error".to_string(),
        )),
    }
}

/// Read the audio file into a multipart part with a content type inferred
/// from the extension: `audio/mp4` for `.m4a`, `audio/mpeg` otherwise.
async fn audio_part(audio_path: &Path) -> Result<Part, PipelineError> {
    let bytes = tokio::fs::read(audio_path)
        .await
        .map_err(|e| PipelineError::Resource(format!("failed to read audio file: {}", e)))?;

    let filename = audio_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("audio.wav")
        .to_string();

    let content_type = if filename.ends_with(".m4a") {
        "audio/mp4"
    } else {
        "audio/mpeg"
    };

    Part::bytes(bytes)
        .file_name(filename)
        .mime_str(content_type)
        .map_err(|e| PipelineError::Protocol(e.to_string()))
}

fn http_client() -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| PipelineError::network(e.to_string()))
}

/// Tolerant extraction of the `text` field from a JSON body: locate the
/// first `"text"` key, the `:` after it, and the first quoted string after
/// that. Deliberately non-strict; it mirrors what the direct backend's
/// clients have always accepted.
pub fn extract_text(json: &str) -> Option<String> {
    let text_idx = json.find("\"text\"")?;
    let colon_idx = json[text_idx..].find(':')? + text_idx;
    let start_quote = json[colon_idx..].find('"')? + colon_idx;
    let end_quote = json[start_quote + 1..].find('"')? + start_quote + 1;
    Some(json[start_quote + 1..end_quote].to_string())
}

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::Settings;
use crate::error::PipelineError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Rewrite `text` for grammar and professionalism. Replaces the editor text
/// wholesale on success; fails fast on empty input or missing key.
pub async fn improve(settings: &Settings, text: &str) -> Result<String, PipelineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::Config("no text to improve".to_string()));
    }

    let prompt = format!(
        "Please improve this text by fixing any grammar issues and making it \
         more professional. Return only the improved text without any \
         additional words or explanations:\n\n{}",
        text
    );
    complete(settings, &prompt).await
}

/// Apply spoken edit instructions to `original`. The instructions arrive
/// already transcribed; the nested capture flow lives in the overlay.
pub async fn apply_voice_edit(
    settings: &Settings,
    original: &str,
    instructions: &str,
) -> Result<String, PipelineError> {
    let original = original.trim();
    if original.is_empty() {
        return Err(PipelineError::Config("no text to edit".to_string()));
    }

    let prompt = format!(
        "Original text:\n{}\n\nEdit instructions:\n{}\n\nPlease edit the \
         original text according to these edit instructions. Return only the \
         edited text without any explanations.",
        original, instructions
    );
    complete(settings, &prompt).await
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// One chat-completion round trip: `{model, messages, temperature: 0.3}`
/// out, `choices[0].message.content` (trimmed) back.
async fn complete(settings: &Settings, prompt: &str) -> Result<String, PipelineError> {
    let key = settings.transcription.api_key.trim();
    if key.is_empty() {
        return Err(PipelineError::Config(
            "completion API key must be set".to_string(),
        ));
    }

    let request = CompletionRequest {
        model: &settings.completion.model,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
        temperature: 0.3,
    };

    info!("Dispatching completion ({})", settings.completion.model);

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| PipelineError::network(e.to_string()))?;

    let response = client
        .post(&settings.completion.url)
        .bearer_auth(key)
        .json(&request)
        .send()
        .await
        .map_err(|e| PipelineError::network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PipelineError::http(status.as_u16(), body));
    }

    let parsed: CompletionResponse = response
        .json()
        .await
        .map_err(|e| PipelineError::Protocol(format!("invalid completion response: {}", e)))?;

    match parsed.choices.into_iter().next() {
        Some(choice) => Ok(choice.message.content.trim().to_string()),
        None => Err(PipelineError::Protocol(
            "no choices in completion response".to_string(),
        )),
    }
}

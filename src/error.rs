use thiserror::Error;

/// Errors raised by an audio capture backend.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("encoder init failed: {0}")]
    EncoderInit(String),

    #[error("not currently recording")]
    NotRecording,

    #[error("already recording")]
    AlreadyRecording,

    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the transcription and refinement pipelines.
///
/// `Config` and `Capture` are detected synchronously at dispatch, before any
/// network call. `Network` and `Protocol` only arrive through the async
/// completion of the call that failed. All variants are non-fatal: the
/// overlay rolls back to a resting state and keeps serving events.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("HTTP error{}: {message}", status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("not configured: {0}")]
    Config(String),

    #[error("resource error: {0}")]
    Resource(String),
}

impl PipelineError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Network {
            status: Some(status),
            message: body.into(),
        }
    }

    /// Status code carried by a `Network` error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }
}

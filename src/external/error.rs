use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Ollama error: {0}")]
    OllamaError(String),
}

impl ExternalError {
    /// Transient failures worth another attempt: connection problems,
    /// timeouts, throttling and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExternalError::ConnectionError(_)
            | ExternalError::Timeout(_)
            | ExternalError::OllamaError(_) => true,
            ExternalError::HttpError { status, .. } => *status == 429 || *status >= 500,
            ExternalError::MalformedResponse(_) | ExternalError::ConfigError(_) => false,
        }
    }
}

impl From<reqwest::Error> for ExternalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ExternalError::MalformedResponse(e.to_string())
        } else if let Some(status) = e.status() {
            ExternalError::HttpError {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            ExternalError::ConnectionError(e.to_string())
        }
    }
}

mod embedding;
pub mod error;
mod gemini;
mod llm;
pub mod retry;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

pub use embedding::{check_batch, Embedder, EmbeddingConfig, OllamaEmbedder};
pub use error::ExternalError;
pub use gemini::{GeminiClient, GeminiEmbedder, GeminiGenerator, GEMINI_API_BASE};
pub use llm::{Generator, LLMConfig, OllamaGenerator};
pub use retry::{with_retry, RetryPolicy};

#[cfg(test)]
pub use embedding::MockEmbedder;
#[cfg(test)]
pub use llm::MockGenerator;

/// Which service backs the embedding or generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Ollama,
}

impl FromStr for Provider {
    type Err = ExternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "ollama" => Ok(Provider::Ollama),
            other => Err(ExternalError::ConfigError(format!(
                "Unknown provider: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

/// Build the Ollama base URL from a host (with or without scheme) and port.
pub(crate) fn ollama_url(host: &str, port: u16) -> Result<Url, ExternalError> {
    let url = if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host.trim_end_matches('/'), port)
    } else {
        format!("http://{}:{}", host, port)
    };

    Url::parse(&url).map_err(|e| ExternalError::ConfigError(format!("Invalid URL: {}", e)))
}

fn require_api_key(api_key: &Option<String>) -> Result<String, ExternalError> {
    api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ExternalError::ConfigError("GOOGLE_API_KEY is not set".to_string()))
}

/// Construct the configured embedding adapter.
pub fn build_embedder(
    config: &EmbeddingConfig,
    policy: RetryPolicy,
    batch_concurrency: usize,
) -> Result<Arc<dyn Embedder>, ExternalError> {
    match config.provider {
        Provider::Gemini => {
            let client = GeminiClient::new(GEMINI_API_BASE, &require_api_key(&config.api_key)?)?;
            Ok(Arc::new(GeminiEmbedder::new(client, &config.model, policy)))
        }
        Provider::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            config.clone(),
            policy,
            batch_concurrency,
        )?)),
    }
}

/// Construct the configured language-model adapter.
pub fn build_generator(
    config: &LLMConfig,
    policy: RetryPolicy,
) -> Result<Arc<dyn Generator>, ExternalError> {
    match config.provider {
        Provider::Gemini => {
            let client = GeminiClient::new(GEMINI_API_BASE, &require_api_key(&config.api_key)?)?;
            Ok(Arc::new(GeminiGenerator::new(client, config, policy)))
        }
        Provider::Ollama => Ok(Arc::new(OllamaGenerator::new(config.clone(), policy)?)),
    }
}

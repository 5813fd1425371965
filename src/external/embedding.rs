use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use ollama_rs::Ollama;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[cfg(test)]
use mockall::automock;

use crate::external::error::ExternalError;
use crate::external::retry::{with_retry, RetryPolicy};
use crate::external::Provider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: Provider,
    pub model: String,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl EmbeddingConfig {
    /// Get the full URL for the Ollama service
    pub fn get_url(&self) -> Result<Url, ExternalError> {
        super::ollama_url(&self.host, self.port)
    }

    pub fn default_model(provider: Provider) -> &'static str {
        match provider {
            Provider::Gemini => "text-embedding-004",
            Provider::Ollama => "nomic-embed-text",
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: Self::default_model(Provider::Gemini).to_string(),
            host: "localhost".to_string(),
            port: 11434,
            api_key: None,
        }
    }
}

/// Maps text to fixed-dimension vectors through an external model.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of passages, one vector per input in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ExternalError>;

    /// Identifier of the model producing the vectors.
    fn model(&self) -> String;
}

/// Reject responses that do not line up with the request: wrong count,
/// empty vectors, or vectors of differing dimension.
pub fn check_batch(requested: usize, vectors: &[Vec<f32>]) -> Result<(), ExternalError> {
    if vectors.len() != requested {
        return Err(ExternalError::MalformedResponse(format!(
            "expected {} embeddings, got {}",
            requested,
            vectors.len()
        )));
    }

    if let Some(first) = vectors.first() {
        if first.is_empty() {
            return Err(ExternalError::MalformedResponse(
                "empty embedding vector".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
            return Err(ExternalError::MalformedResponse(format!(
                "inconsistent embedding dimensions: {} vs {}",
                first.len(),
                bad.len()
            )));
        }
    }

    Ok(())
}

/// Embedder backed by a local Ollama server
pub struct OllamaEmbedder {
    client: Ollama,
    config: EmbeddingConfig,
    policy: RetryPolicy,
    max_concurrent_requests: usize,
}

impl OllamaEmbedder {
    /// Create a new embedder with the given configuration
    pub fn new(
        config: EmbeddingConfig,
        policy: RetryPolicy,
        max_concurrent_requests: usize,
    ) -> Result<Self, ExternalError> {
        let url = config.get_url()?;
        let host = format!(
            "{}://{}",
            url.scheme(),
            url.host_str().unwrap_or("localhost")
        );
        let client = Ollama::new(host, config.port);

        Ok(Self {
            client,
            config,
            policy,
            max_concurrent_requests: max_concurrent_requests.max(1),
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ExternalError> {
        let client = &self.client;
        let model = &self.config.model;

        with_retry(&self.policy, "ollama embedding", move || async move {
            let response = client
                .generate_embeddings(model.clone(), text.to_string(), None)
                .await
                .map_err(|e| ExternalError::OllamaError(e.to_string()))?;

            // Convert from Vec<f64> to Vec<f32>
            Ok(response.embeddings.into_iter().map(|x| x as f32).collect())
        })
        .await
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError> {
        debug!(
            "Embedding {} texts with Ollama model {}",
            texts.len(),
            self.config.model
        );

        // Ollama embeds one prompt per request; fan out but keep input order.
        let requests: Vec<_> = texts.iter().map(|text| self.embed_one(text)).collect();
        let vectors: Vec<Vec<f32>> = stream::iter(requests)
            .buffered(self.max_concurrent_requests)
            .try_collect()
            .await?;

        check_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ExternalError> {
        let vector = self.embed_one(text).await?;
        check_batch(1, std::slice::from_ref(&vector))?;
        Ok(vector)
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }
}

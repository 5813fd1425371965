//! Google Generative Language API adapters (embeddings and text generation).

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::external::embedding::{check_batch, Embedder};
use crate::external::error::ExternalError;
use crate::external::llm::{Generator, LLMConfig};
use crate::external::retry::{with_retry, RetryPolicy};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const TASK_RETRIEVAL_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";
const TASK_RETRIEVAL_QUERY: &str = "RETRIEVAL_QUERY";

/// Upper bound on requests in one `batchEmbedContents` call.
pub const MAX_BATCH_REQUESTS: usize = 100;

/// Thin JSON-over-HTTPS client shared by the Gemini adapters.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ExternalError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ExternalError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, model_path(model), method)
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ExternalError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ExternalError::MalformedResponse(e.to_string()))
    }
}

/// Gemini expects fully qualified model names (`models/<id>`).
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content,
    task_type: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
    policy: RetryPolicy,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient, model: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            model: model_path(model),
            policy,
        }
    }

    async fn embed(&self, texts: &[String], task_type: &str) -> Result<Vec<Vec<f32>>, ExternalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts with {} ({})",
            texts.len(),
            self.model,
            task_type
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_REQUESTS) {
            vectors.extend(self.embed_batch(batch, task_type).await?);
        }
        Ok(vectors)
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        task_type: &str,
    ) -> Result<Vec<Vec<f32>>, ExternalError> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content {
                        role: None,
                        parts: vec![Part { text: text.clone() }],
                    },
                    task_type,
                })
                .collect(),
        };

        let url = self.client.endpoint(&self.model, "batchEmbedContents");
        let client = &self.client;
        let url = &url;
        let request = &request;

        let response: BatchEmbedResponse = with_retry(&self.policy, "gemini embedding", move || {
            client.post_json(url, request)
        })
        .await?;

        let vectors: Vec<Vec<f32>> = response.embeddings.into_iter().map(|e| e.values).collect();
        check_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExternalError> {
        self.embed(texts, TASK_RETRIEVAL_DOCUMENT).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ExternalError> {
        let mut vectors = self.embed(&[text.to_string()], TASK_RETRIEVAL_QUERY).await?;
        vectors
            .pop()
            .ok_or_else(|| ExternalError::MalformedResponse("no embedding returned".to_string()))
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
    temperature: f32,
    top_p: f32,
    policy: RetryPolicy,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient, config: &LLMConfig, policy: RetryPolicy) -> Self {
        Self {
            client,
            model: model_path(&config.model),
            temperature: config.temperature,
            top_p: config.top_p,
            policy,
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: self.top_p,
            },
        };

        let url = self.client.endpoint(&self.model, "generateContent");
        let client = &self.client;
        let url = &url;
        let request = &request;

        let response: GenerateContentResponse =
            with_retry(&self.policy, "gemini generation", move || {
                client.post_json(url, request)
            })
            .await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ExternalError::MalformedResponse(
                "no candidate text in response".to_string(),
            ));
        }

        Ok(text)
    }
}

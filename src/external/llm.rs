use async_trait::async_trait;
use ollama_rs::{
    generation::{completion::request::GenerationRequest, options::GenerationOptions},
    Ollama,
};
use serde::{Deserialize, Serialize};
use url::Url;

#[cfg(test)]
use mockall::automock;

use crate::external::error::ExternalError;
use crate::external::retry::{with_retry, RetryPolicy};
use crate::external::Provider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: Provider,
    pub model: String,
    pub host: String,
    pub port: u16,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl LLMConfig {
    /// Get the full URL for the Ollama service
    pub fn get_url(&self) -> Result<Url, ExternalError> {
        super::ollama_url(&self.host, self.port)
    }

    pub fn default_model(provider: Provider) -> &'static str {
        match provider {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::Ollama => "mistral",
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: Self::default_model(Provider::Gemini).to_string(),
            host: "localhost".to_string(),
            port: 11434,
            temperature: 0.2,
            top_p: 0.9,
            api_key: None,
        }
    }
}

/// Produces an answer from a fully rendered prompt.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError>;
}

/// Generator backed by a local Ollama server
pub struct OllamaGenerator {
    client: Ollama,
    config: LLMConfig,
    policy: RetryPolicy,
}

impl OllamaGenerator {
    /// Create a new generator with the given configuration
    pub fn new(config: LLMConfig, policy: RetryPolicy) -> Result<Self, ExternalError> {
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
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalError> {
        let client = &self.client;
        let config = &self.config;

        let text = with_retry(&self.policy, "ollama generation", move || async move {
            let mut request = GenerationRequest::new(config.model.clone(), prompt.to_string());

            let options = GenerationOptions::default()
                .temperature(config.temperature)
                .top_p(config.top_p);

            request.options = Some(options);

            let response = client
                .generate(request)
                .await
                .map_err(|e| ExternalError::OllamaError(e.to_string()))?;

            Ok(response.response)
        })
        .await?;

        if text.trim().is_empty() {
            return Err(ExternalError::MalformedResponse(
                "model returned an empty completion".to_string(),
            ));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_url_generation() {
        // Test with plain hostname
        let config = LLMConfig {
            host: "localhost".to_string(),
            port: 11434,
            ..LLMConfig::default()
        };
        assert_eq!(config.get_url().unwrap().as_str(), "http://localhost:11434/");

        // Test with http:// prefix
        let config = LLMConfig {
            host: "http://example.com".to_string(),
            port: 11434,
            ..LLMConfig::default()
        };
        assert_eq!(config.get_url().unwrap().as_str(), "http://example.com:11434/");
    }

    #[test]
    fn test_defaults_match_factual_settings() {
        let config = LLMConfig::default();
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.model, "gemini-2.5-flash");
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(LLMConfig::default_model(Provider::Ollama), "mistral");
    }

    fn ollama_generator(server: &MockServer) -> OllamaGenerator {
        let config = LLMConfig {
            provider: Provider::Ollama,
            model: "mistral".to_string(),
            host: "127.0.0.1".to_string(),
            port: server.address().port(),
            ..LLMConfig::default()
        };
        OllamaGenerator::new(config, RetryPolicy::new(1, Duration::from_secs(5))).unwrap()
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "model": "mistral",
            "created_at": "2024-05-01T10:00:00Z",
            "response": text,
            "done": true,
            "context": [1, 2, 3],
            "total_duration": 1000,
            "prompt_eval_count": 12,
            "prompt_eval_duration": 100,
            "eval_count": 8,
            "eval_duration": 200
        })
    }

    #[tokio::test]
    async fn test_ollama_generation_returns_raw_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "mistral",
                "prompt": "How long is a learner's licence valid?",
                "stream": false
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion(" A learner's licence is valid for six months. ")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let generator = ollama_generator(&server);
        let response = generator
            .generate("How long is a learner's licence valid?")
            .await
            .unwrap();
        assert_eq!(response, " A learner's licence is valid for six months. ");
    }

    #[tokio::test]
    async fn test_ollama_blank_completion_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  \n")))
            .mount(&server)
            .await;

        let generator = ollama_generator(&server);
        let result = generator.generate("anything").await;
        assert!(matches!(result, Err(ExternalError::MalformedResponse(_))));
    }
}

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::chunker::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::datasource::DEFAULT_DOCUMENT_PATTERN;
use crate::external::{EmbeddingConfig, LLMConfig, Provider, RetryPolicy};
use crate::pipeline::DEFAULT_BATCH_SIZE;
use crate::retriever::DEFAULT_TOP_K;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn chunker(&self) -> Result<Chunker> {
        Chunker::new(self.chunk_size, self.chunk_overlap).context("Invalid chunking parameters")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_score: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub batch_size: usize,
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub log_level: String,
}

impl ProcessingConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.request_timeout_secs),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub documents_dir: PathBuf,
    pub document_pattern: String,
    pub vector_store_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub llm: LLMConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub processing: ProcessingConfig,
    pub storage: StorageConfig,
}

/// Read `key` and parse it, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_provider(key: &str) -> Result<Provider> {
    match env::var(key) {
        Ok(value) => value
            .parse::<Provider>()
            .with_context(|| format!("Invalid value for {}", key)),
        Err(_) => Ok(Provider::Gemini),
    }
}

/// An optional score floor. Once set it must be a finite number.
fn env_min_score(key: &str) -> Result<Option<f32>> {
    let value = match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(None),
    };
    let score: f32 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))?;
    if !score.is_finite() {
        bail!("{} must be a finite number, got {:?}", key, value);
    }
    Ok(Some(score))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env_string("OLLAMA_HOST", "localhost");
        let port = env_or("OLLAMA_PORT", 11434);
        let api_key = env::var("GOOGLE_API_KEY").ok().filter(|k| !k.trim().is_empty());

        // Load embedding config
        let embedding_provider = env_provider("EMBEDDING_PROVIDER")?;
        let embedding = EmbeddingConfig {
            provider: embedding_provider,
            model: env_string(
                "EMBEDDING_MODEL",
                EmbeddingConfig::default_model(embedding_provider),
            ),
            host: host.clone(),
            port,
            api_key: api_key.clone(),
        };

        // Load LLM config
        let llm_provider = env_provider("LLM_PROVIDER")?;
        let llm = LLMConfig {
            provider: llm_provider,
            model: env_string("LLM_MODEL", LLMConfig::default_model(llm_provider)),
            host,
            port,
            temperature: env_or("LLM_TEMPERATURE", 0.2),
            top_p: env_or("LLM_TOP_P", 0.9),
            api_key,
        };

        let chunking = ChunkingConfig {
            chunk_size: env_or("CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            chunk_overlap: env_or("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP),
        };

        let retrieval = RetrievalConfig {
            top_k: env_or("RETRIEVAL_TOP_K", DEFAULT_TOP_K),
            min_score: env_min_score("RETRIEVAL_MIN_SCORE")?,
        };

        // Load processing config
        let processing = ProcessingConfig {
            batch_size: env_or("BATCH_SIZE", DEFAULT_BATCH_SIZE),
            max_concurrent_requests: env_or("MAX_CONCURRENT_REQUESTS", 4),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            max_retries: env_or("MAX_RETRIES", 3),
            log_level: env_string("LOG_LEVEL", "info"),
        };

        let storage = StorageConfig {
            documents_dir: PathBuf::from(env_string("DOCUMENTS_PATH", "documents")),
            document_pattern: env_string("DOCUMENT_PATTERN", DEFAULT_DOCUMENT_PATTERN),
            vector_store_path: PathBuf::from(env_string("VECTOR_STORE_PATH", "vector_store")),
        };

        Ok(Self {
            embedding,
            llm,
            chunking,
            retrieval,
            processing,
            storage,
        })
    }

    /// Settings every command needs before touching documents or the network.
    pub fn validate_common(&self) -> Result<()> {
        self.chunking.chunker()?;
        if self.retrieval.top_k == 0 {
            bail!("RETRIEVAL_TOP_K must be greater than zero");
        }
        if self.processing.batch_size == 0 {
            bail!("BATCH_SIZE must be greater than zero");
        }
        if self.processing.max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be greater than zero");
        }
        if self.embedding.provider == Provider::Gemini && self.embedding.api_key.is_none() {
            bail!("GOOGLE_API_KEY is required for the gemini embedding provider");
        }
        Ok(())
    }

    /// Full validation for commands that also call the language model.
    pub fn validate(&self) -> Result<()> {
        self.validate_common()?;
        if self.llm.provider == Provider::Gemini && self.llm.api_key.is_none() {
            bail!("GOOGLE_API_KEY is required for the gemini LLM provider");
        }
        Ok(())
    }
}

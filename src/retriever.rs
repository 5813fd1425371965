use std::sync::Arc;
use tracing::debug;

use crate::document::Chunk;
use crate::error::RagError;
use crate::external::Embedder;
use crate::index::VectorIndex;

pub const DEFAULT_TOP_K: usize = 4;

/// Separator between passages in the rendered context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// A ranked passage owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    pub chunk: Chunk,
    pub score: f32,
}

/// Embeds a question and pulls the closest chunks from the shared index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    top_k: usize,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
            min_score: None,
        }
    }

    /// Drop hits scoring below `min_score`. `None` keeps every top-k hit.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedPassage>, RagError> {
        let vector = self
            .embedder
            .embed_query(question)
            .await
            .map_err(RagError::Embedding)?;

        let hits = self.index.search(&vector, self.top_k)?;
        let total = hits.len();

        let passages: Vec<RetrievedPassage> = hits
            .into_iter()
            .filter(|hit| self.min_score.map_or(true, |floor| hit.score >= floor))
            .map(|hit| RetrievedPassage {
                chunk: hit.chunk.clone(),
                score: hit.score,
            })
            .collect();

        debug!(
            "Retrieved {} passages ({} below floor)",
            passages.len(),
            total - passages.len()
        );
        Ok(passages)
    }

    /// Passage texts joined in ranked order.
    pub async fn context(&self, question: &str) -> Result<String, RagError> {
        let passages = self.retrieve(question).await?;
        Ok(format_context(&passages))
    }
}

pub fn format_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|p| p.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::chunker::Chunker;
use crate::datasource::DataSource;
use crate::document::Chunk;
use crate::error::RagError;
use crate::external::{check_batch, Embedder};
use crate::index::VectorIndex;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Summary of a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub index_path: PathBuf,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Indexed {} chunks from {} documents ({}, dimension {}) into {}",
            self.chunks,
            self.documents,
            self.embedding_model,
            self.dimension,
            self.index_path.display()
        )
    }
}

/// Load, chunk, embed, build, persist. Any failure aborts the run before the
/// index is written.
pub struct IngestPipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    vector_store: PathBuf,
}

impl IngestPipeline {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        vector_store: impl Into<PathBuf>,
    ) -> Result<Self, RagError> {
        if batch_size == 0 {
            return Err(RagError::Config(
                "batch size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            chunker,
            embedder,
            batch_size,
            vector_store: vector_store.into(),
        })
    }

    pub fn vector_store(&self) -> &Path {
        &self.vector_store
    }

    pub async fn run(&self, source: &dyn DataSource) -> Result<IngestReport, RagError> {
        let documents = source.collect().await?;
        let document_count = documents.len();

        let chunks = self.chunker.split_all(&documents);
        drop(documents);
        if chunks.is_empty() {
            return Err(RagError::Load(
                "documents produced no chunks to index".to_string(),
            ));
        }
        info!(
            "Split {} documents into {} chunks",
            document_count,
            chunks.len()
        );

        let vectors = self.embed_chunks(&chunks).await?;
        let chunk_count = chunks.len();
        let entries = vectors.into_iter().zip(chunks).collect();

        let index = VectorIndex::build(self.embedder.model(), entries)?;
        index.persist(&self.vector_store)?;

        Ok(IngestReport {
            documents: document_count,
            chunks: chunk_count,
            dimension: index.dimension(),
            embedding_model: index.embedding_model().to_string(),
            index_path: VectorIndex::file_path(&self.vector_store),
        })
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, RagError> {
        let batches = chunks.len().div_ceil(self.batch_size);
        let mut vectors = Vec::with_capacity(chunks.len());

        for (i, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let embedded = self
                .embedder
                .embed_documents(&texts)
                .await
                .map_err(RagError::Embedding)?;
            check_batch(texts.len(), &embedded).map_err(RagError::Embedding)?;

            debug!("Embedded batch {}/{} ({} chunks)", i + 1, batches, texts.len());
            vectors.extend(embedded);
        }

        info!("Embedded {} chunks in {} batches", vectors.len(), batches);
        Ok(vectors)
    }
}

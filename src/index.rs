use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::document::Chunk;
use crate::error::RagError;

/// File name of the serialized index inside the vector store directory.
pub const INDEX_FILE: &str = "index.json";

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// A search result borrowing its chunk from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

#[derive(Serialize)]
struct StoredIndexRef<'a> {
    format_version: u32,
    embedding_model: &'a str,
    dimension: usize,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct StoredIndex {
    format_version: u32,
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

/// Flat exact-search index over chunk embeddings.
///
/// Built once from a complete entry list and never mutated afterwards, so it
/// can be shared behind an `Arc` by any number of concurrent readers.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
}

impl VectorIndex {
    pub fn build(
        embedding_model: impl Into<String>,
        entries: Vec<(Vec<f32>, Chunk)>,
    ) -> Result<Self, RagError> {
        let entries: Vec<IndexEntry> = entries
            .into_iter()
            .map(|(vector, chunk)| IndexEntry { vector, chunk })
            .collect();

        let dimension = entries.first().map(|e| e.vector.len()).unwrap_or(0);
        check_dimension(dimension, &entries)?;

        let index = Self::from_parts(embedding_model.into(), dimension, entries);
        debug!(
            "Built index with {} entries of dimension {}",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    fn from_parts(embedding_model: String, dimension: usize, entries: Vec<IndexEntry>) -> Self {
        let norms = entries.iter().map(|e| norm(&e.vector)).collect();
        Self {
            embedding_model,
            dimension,
            entries,
            norms,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension shared by every entry; zero for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Exact cosine search. Hits are ordered by descending score; equal
    /// scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>, RagError> {
        if self.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(idx, (entry, entry_norm))| {
                (idx, cosine(query, query_norm, &entry.vector, *entry_norm))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| SearchHit {
                chunk: &self.entries[idx].chunk,
                score,
            })
            .collect())
    }

    /// Path of the index file inside a vector store directory.
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Write the index to `dir/index.json`. The data goes to a temporary file
    /// in the same directory first and only replaces the target once fully
    /// written, so a failure leaves any previous index intact.
    pub fn persist(&self, dir: &Path) -> Result<(), RagError> {
        std::fs::create_dir_all(dir)?;

        let stored = StoredIndexRef {
            format_version: FORMAT_VERSION,
            embedding_model: &self.embedding_model,
            dimension: self.dimension,
            entries: &self.entries,
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &stored).map_err(std::io::Error::from)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        let target = Self::file_path(dir);
        tmp.persist(&target).map_err(|e| RagError::Io(e.error))?;

        info!(
            "Persisted {} entries to {}",
            self.entries.len(),
            target.display()
        );
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, RagError> {
        let path = Self::file_path(dir);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::CorruptIndex(format!(
                    "no index found at {}, run ingestion first",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let stored: StoredIndex = serde_json::from_slice(&content)
            .map_err(|e| RagError::CorruptIndex(format!("{}: {}", path.display(), e)))?;

        if stored.format_version != FORMAT_VERSION {
            return Err(RagError::CorruptIndex(format!(
                "unsupported format version {} (expected {})",
                stored.format_version, FORMAT_VERSION
            )));
        }
        check_dimension(stored.dimension, &stored.entries)
            .map_err(|e| RagError::CorruptIndex(format!("{}: {}", path.display(), e)))?;

        let index = Self::from_parts(stored.embedding_model, stored.dimension, stored.entries);
        info!(
            "Loaded index with {} entries ({}, dimension {}) from {}",
            index.len(),
            index.embedding_model,
            index.dimension,
            path.display()
        );
        Ok(index)
    }
}

/// Every entry must carry a vector of exactly `dimension` values, and a
/// non-empty index cannot have dimension zero.
fn check_dimension(dimension: usize, entries: &[IndexEntry]) -> Result<(), RagError> {
    if !entries.is_empty() && dimension == 0 {
        return Err(RagError::DimensionMismatch {
            expected: 1,
            found: 0,
        });
    }
    if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
        return Err(RagError::DimensionMismatch {
            expected: dimension,
            found: bad.vector.len(),
        });
    }
    Ok(())
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

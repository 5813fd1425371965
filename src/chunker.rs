use tracing::debug;

use crate::document::{Chunk, Document};
use crate::error::RagError;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Fixed-size sliding-window splitter.
///
/// Sizes are counted in characters. Each window starts `max_chunk_size - overlap`
/// characters after the previous one, so consecutive chunks share exactly
/// `overlap` characters and only the last chunk of a document may be shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self, RagError> {
        if max_chunk_size == 0 {
            return Err(RagError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= max_chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_chunk_size
            )));
        }

        Ok(Self {
            max_chunk_size,
            overlap,
        })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.max_chunk_size - self.overlap
    }

    /// Split one document into ordered, overlapping chunks.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;

        // Byte offset of every character boundary, including the end of text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut chunks = Vec::new();
        if char_count == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let end = (start + self.max_chunk_size).min(char_count);
            let slice = &text[boundaries[start]..boundaries[end]];
            chunks.push(Chunk::new(
                slice.to_string(),
                document.source.clone(),
                chunks.len(),
                start,
            ));

            if end == char_count {
                break;
            }
            start += self.step();
        }

        debug!(
            "Split {} ({} chars) into {} chunks",
            document.source.display(),
            char_count,
            chunks.len()
        );

        chunks
    }

    /// Split a batch of documents, keeping document order.
    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }
}

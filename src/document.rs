use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Raw text of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Extracted text content
    pub text: String,
    /// Path of the file the text came from
    pub source: PathBuf,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }

    /// Length in characters, the unit chunk sizes are measured in
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A bounded slice of a document's text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier for the chunk
    pub id: Uuid,
    /// Passage text
    pub text: String,
    /// Source document path
    pub source: PathBuf,
    /// Ordinal of the chunk within its document
    pub index: usize,
    /// Character offset of the chunk start within the document
    pub start: usize,
}

impl Chunk {
    pub fn new(text: String, source: PathBuf, index: usize, start: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            source,
            index,
            start,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Character offset one past the chunk end
    pub fn end(&self) -> usize {
        self.start + self.char_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_char_len_counts_characters() {
        let doc = Document::new("₹500 fine", "documents/mv_act.pdf");
        assert_eq!(doc.char_len(), 9);
        assert!(doc.text.len() > 9);
    }

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new(
            "Section 129".to_string(),
            PathBuf::from("documents/mv_act.pdf"),
            2,
            850,
        );

        assert_eq!(chunk.index, 2);
        assert_eq!(chunk.start, 850);
        assert_eq!(chunk.end(), 861);
        assert_eq!(chunk.source, PathBuf::from("documents/mv_act.pdf"));
    }

    #[test]
    fn test_chunk_ids_unique() {
        let a = Chunk::new("a".to_string(), PathBuf::from("x"), 0, 0);
        let b = Chunk::new("a".to_string(), PathBuf::from("x"), 0, 0);
        assert_ne!(a.id, b.id);
    }
}

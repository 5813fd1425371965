mod markdown;
mod pdf;

use std::path::Path;

use crate::error::RagError;

pub use markdown::{markdown_to_text, MarkdownExtractor};
pub use pdf::PdfExtractor;

/// Turns one source file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, RagError>;
}

/// Reads the file as UTF-8 text.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, RagError> {
        std::fs::read_to_string(path)
            .map_err(|e| RagError::Load(format!("Failed to read {}: {}", path.display(), e)))
    }
}

/// Pick an extractor from the file extension.
pub fn extractor_for(path: &Path) -> &'static dyn TextExtractor {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => &PdfExtractor,
        Some("md") | Some("markdown") => &MarkdownExtractor,
        _ => &PlainTextExtractor,
    }
}

use std::path::Path;
use tracing::{debug, warn};

use super::TextExtractor;
use crate::error::RagError;

/// Extracts the text layer of every page, in page order.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, RagError> {
        let document = lopdf::Document::load(path)
            .map_err(|e| RagError::Load(format!("Failed to open PDF {}: {}", path.display(), e)))?;

        let pages = document.get_pages();
        let mut texts = Vec::with_capacity(pages.len());

        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) => texts.push(text),
                // Pages without a decodable text layer are dropped
                Err(e) => warn!(
                    "Skipping page {} of {}: {}",
                    page_number,
                    path.display(),
                    e
                ),
            }
        }

        debug!(
            "Extracted {} of {} pages from {}",
            texts.len(),
            pages.len(),
            path.display()
        );

        Ok(texts.join("\n"))
    }
}

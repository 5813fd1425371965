use pulldown_cmark::{Event, Options, Parser, Tag};
use std::path::Path;

use super::TextExtractor;
use crate::error::RagError;

/// Strips markdown markup, keeping one block of text per paragraph, heading,
/// list item or code block.
pub struct MarkdownExtractor;

impl TextExtractor for MarkdownExtractor {
    fn extract(&self, path: &Path) -> Result<String, RagError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::Load(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(markdown_to_text(&content))
    }
}

/// Render markdown as plain text with blocks separated by blank lines.
pub fn markdown_to_text(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for event in Parser::new_ext(content, options) {
        match event {
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak | Event::HardBreak => current.push('\n'),
            Event::End(Tag::TableCell) => current.push(' '),
            // Nested lists open a new item before the parent item ends.
            Event::Start(Tag::Item) => flush(&mut blocks, &mut current),
            Event::End(
                Tag::Paragraph
                | Tag::Heading(..)
                | Tag::CodeBlock(_)
                | Tag::Item
                | Tag::TableHead
                | Tag::TableRow,
            )
            | Event::Rule => flush(&mut blocks, &mut current),
            _ => {}
        }
    }
    flush(&mut blocks, &mut current);

    blocks.join("\n\n")
}

fn flush(blocks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        blocks.push(trimmed.to_string());
    }
    current.clear();
}

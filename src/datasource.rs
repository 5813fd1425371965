use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::RagError;
use crate::parser::extractor_for;

pub const DEFAULT_DOCUMENT_PATTERN: &str = "**/*.pdf";

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn collect(&self) -> Result<Vec<Document>, RagError>;
}

/// Every file under a directory whose relative path matches a glob.
pub struct DirectorySource {
    root: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P, pattern: &str) -> Result<Self, RagError> {
        let matcher = Glob::new(pattern)
            .map_err(|e| RagError::Config(format!("Invalid document pattern {:?}: {}", pattern, e)))?
            .compile_matcher();

        Ok(Self {
            root: root.as_ref().to_owned(),
            pattern: pattern.to_string(),
            matcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching file paths, sorted.
    fn matching_files(&self) -> Result<Vec<PathBuf>, RagError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                RagError::Load(format!("Failed to walk {}: {}", self.root.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or_else(|_| entry.path());
            if self.matcher.is_match(relative) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl DataSource for DirectorySource {
    async fn collect(&self) -> Result<Vec<Document>, RagError> {
        if !self.root.is_dir() {
            return Err(RagError::Load(format!(
                "Documents directory not found: {}",
                self.root.display()
            )));
        }

        let files = self.matching_files()?;
        if files.is_empty() {
            return Err(RagError::Load(format!(
                "No files matching {:?} under {}",
                self.pattern,
                self.root.display()
            )));
        }

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let text = extractor_for(&path).extract(&path)?;
            if text.trim().is_empty() {
                warn!("Skipping {}: no extractable text", path.display());
                continue;
            }
            debug!("Loaded {} ({} bytes)", path.display(), text.len());
            documents.push(Document::new(text, path));
        }

        if documents.is_empty() {
            return Err(RagError::Load(format!(
                "None of the files under {} contained extractable text",
                self.root.display()
            )));
        }

        info!(
            "Loaded {} documents from {}",
            documents.len(),
            self.root.display()
        );
        Ok(documents)
    }
}

//! Markdown ingestion: one document per file.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::IngestionError;
use crate::models::Document;

use super::{expand_sources, DocumentLoader};

pub struct MarkdownLoader {
    extensions: Vec<String>,
}

impl MarkdownLoader {
    pub fn new() -> Self {
        Self {
            extensions: vec!["md".to_string(), "markdown".to_string()],
        }
    }
}

impl Default for MarkdownLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for MarkdownLoader {
    fn name(&self) -> &str {
        "markdown"
    }

    fn load(&self, sources: &[PathBuf]) -> Result<Vec<Document>, IngestionError> {
        let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        let mut documents = Vec::new();

        for path in expand_sources(sources, &extensions) {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable markdown source");
                    continue;
                }
            };
            documents.push(Document::new(content, path.display().to_string()));
        }

        info!(count = documents.len(), "loaded markdown documents");
        Ok(documents)
    }
}

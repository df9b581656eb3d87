//! Prebuilt ingestion: deserializes already chunk-granular documents.
//!
//! For each source file `X.ext` there must be a sibling `X.docs.json`
//! holding a JSON array of documents produced by an out-of-band parsing
//! step (document-structure extraction, slide parsing). Unlike the PDF and
//! Markdown loaders, a missing or unreadable companion is fatal: silently
//! loading a partial pre-chunked corpus would shrink it without
//! explanation.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::IngestionError;
use crate::models::Document;

use super::{expand_sources, DocumentLoader};

const COMPANION_SUFFIX: &str = "docs.json";

pub struct PrebuiltLoader {
    extensions: Vec<String>,
}

impl PrebuiltLoader {
    /// `extensions` selects the source files (e.g. `["pdf", "pptx"]`)
    /// whose companions are loaded when a directory is given.
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl DocumentLoader for PrebuiltLoader {
    fn name(&self) -> &str {
        "prebuilt"
    }

    fn prechunked(&self) -> bool {
        true
    }

    fn load(&self, sources: &[PathBuf]) -> Result<Vec<Document>, IngestionError> {
        let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        let mut documents = Vec::new();

        for path in expand_sources(sources, &extensions) {
            let companion = companion_path(&path);
            if !companion.is_file() {
                return Err(IngestionError::MissingCompanion(path));
            }
            let bytes =
                std::fs::read(&companion).map_err(|e| IngestionError::Unreadable {
                    path: companion.clone(),
                    reason: e.to_string(),
                })?;
            let mut docs: Vec<Document> =
                serde_json::from_slice(&bytes).map_err(|e| IngestionError::Malformed {
                    path: companion.clone(),
                    reason: e.to_string(),
                })?;
            documents.append(&mut docs);
        }

        info!(count = documents.len(), "loaded prebuilt documents");
        Ok(documents)
    }
}

fn companion_path(source: &Path) -> PathBuf {
    if source
        .to_string_lossy()
        .ends_with(&format!(".{}", COMPANION_SUFFIX))
    {
        return source.to_path_buf();
    }
    source.with_extension(COMPANION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetaValue, META_IMAGES};
    use std::fs;
    use tempfile::TempDir;

    fn write_corpus(dir: &Path) -> PathBuf {
        let source = dir.join("deck.pdf");
        fs::write(&source, b"%binary placeholder").unwrap();

        let docs = vec![
            {
                let mut d = Document::new("Slide one: quarterly revenue grew 12%.", "deck.pdf");
                d.metadata.insert(
                    META_IMAGES.to_string(),
                    MetaValue::List(vec!["https://cdn.example/chart.png".to_string()]),
                );
                d
            },
            Document::new("Slide two: churn held steady.", "deck.pdf"),
        ];
        fs::write(
            dir.join("deck.docs.json"),
            serde_json::to_vec(&docs).unwrap(),
        )
        .unwrap();
        source
    }

    #[test]
    fn loads_companion_documents() {
        let tmp = TempDir::new().unwrap();
        let source = write_corpus(tmp.path());

        let loader = PrebuiltLoader::new(&["pdf"]);
        assert!(loader.prechunked());

        let docs = loader.load(&[source]).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].metadata.contains_key(META_IMAGES));
    }

    #[test]
    fn directory_source_finds_companions() {
        let tmp = TempDir::new().unwrap();
        write_corpus(tmp.path());

        let docs = PrebuiltLoader::new(&["pdf"])
            .load(&[tmp.path().to_path_buf()])
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn missing_companion_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let orphan = tmp.path().join("orphan.pdf");
        fs::write(&orphan, b"%binary placeholder").unwrap();

        let result = PrebuiltLoader::new(&["pdf"]).load(&[orphan]);
        assert!(matches!(result, Err(IngestionError::MissingCompanion(_))));
    }

    #[test]
    fn malformed_companion_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("deck.pdf");
        fs::write(&source, b"%binary placeholder").unwrap();
        fs::write(tmp.path().join("deck.docs.json"), b"not json").unwrap();

        let result = PrebuiltLoader::new(&["pdf"]).load(&[source]);
        assert!(matches!(result, Err(IngestionError::Malformed { .. })));
    }
}

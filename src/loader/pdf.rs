//! PDF ingestion: one document per page.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::IngestionError;
use crate::models::Document;

use super::{expand_sources, DocumentLoader};

pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for PdfLoader {
    fn name(&self) -> &str {
        "pdf"
    }

    fn load(&self, sources: &[PathBuf]) -> Result<Vec<Document>, IngestionError> {
        let mut documents = Vec::new();

        for path in expand_sources(sources, &["pdf"]) {
            let pages = match pdf_extract::extract_text_by_pages(&path) {
                Ok(pages) => pages,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable pdf source");
                    continue;
                }
            };
            let source = path.display().to_string();
            for (page, text) in pages.into_iter().enumerate() {
                if text.trim().is_empty() {
                    continue;
                }
                documents.push(Document::new(text, source.clone()).with_page(page as i64));
            }
        }

        info!(count = documents.len(), "loaded pdf page documents");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Minimal single-page PDF. pdf-extract parses the structure but the
    /// page carries no extractable text, which is exactly what the
    /// skip-blank-pages path needs.
    fn minimal_pdf() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(
            b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 4\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
        out.extend_from_slice(b"trailer << /Size 4 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn textless_pdf_yields_no_documents_without_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.pdf");
        fs::write(&path, minimal_pdf()).unwrap();

        let docs = PdfLoader::new().load(&[path]).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn invalid_pdf_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("bad.pdf");
        fs::write(&bad, b"not a pdf at all").unwrap();
        let missing = tmp.path().join("ghost.pdf");

        let docs = PdfLoader::new().load(&[bad, missing]).unwrap();
        assert!(docs.is_empty());
    }
}

//! Pluggable document ingestion.
//!
//! A [`DocumentLoader`] reads raw source locations and produces
//! [`Document`]s with origin metadata. Three variants cover the supported
//! corpora:
//!
//! | Loader | Granularity | Missing source |
//! |--------|-------------|----------------|
//! | [`PdfLoader`] | one document per page | skipped with a warning |
//! | [`MarkdownLoader`] | one document per file | skipped with a warning |
//! | [`PrebuiltLoader`] | already chunk-granular | fatal |
//!
//! The prebuilt variant is strict because its input was parsed out-of-band;
//! silently dropping a file would shrink the corpus without explanation.
//!
//! Source locations may be files or directories. A directory is expanded
//! non-recursively to the files inside it matching the loader's
//! extensions; there is no deeper discovery.

mod markdown;
mod pdf;
mod prebuilt;

pub use markdown::MarkdownLoader;
pub use pdf::PdfLoader;
pub use prebuilt::PrebuiltLoader;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::IngestionError;
use crate::models::Document;

/// Capability interface for ingestion strategies.
pub trait DocumentLoader: Send + Sync {
    /// Short variant name used in logs (e.g. `"markdown"`).
    fn name(&self) -> &str;

    /// True when this loader's output is already chunk-granular and must
    /// bypass the chunker.
    fn prechunked(&self) -> bool {
        false
    }

    /// Load all documents from the given source locations.
    fn load(&self, sources: &[PathBuf]) -> Result<Vec<Document>, IngestionError>;
}

/// Expand source locations: directories become their directly contained
/// files with a matching extension (sorted for determinism); file paths
/// pass through untouched, existing or not.
pub(crate) fn expand_sources(sources: &[PathBuf], extensions: &[&str]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();
    for source in sources {
        if source.is_dir() {
            let mut entries: Vec<PathBuf> = WalkDir::new(source)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| matches_extension(p, extensions))
                .collect();
            entries.sort();
            expanded.extend(entries);
        } else {
            expanded.push(source.clone());
        }
    }
    expanded
}

fn matches_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            extensions.iter().any(|want| *want == e)
        })
        .unwrap_or(false)
}

//! Core data types flowing through the retrieval pipeline.
//!
//! A [`Document`] is a unit of ingested content produced by a loader. The
//! chunker splits documents into [`Chunk`]s, which are what the indexes
//! store and what searches return, wrapped in [`SearchHit`]s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key for the origin identifier. Always present.
pub const META_SOURCE: &str = "source";
/// Metadata key for the zero-based page number (PDF ingestion).
pub const META_PAGE: &str = "page";
/// Metadata key for related image URIs (prebuilt corpora).
pub const META_IMAGES: &str = "images";

/// A single metadata value: a scalar or a sequence of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

/// Document and chunk metadata. BTreeMap keeps serialization stable.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A unit of ingested content. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document tagged with its origin.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.to_string(), MetaValue::Str(source.into()));
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Attach a zero-based page number.
    pub fn with_page(mut self, page: i64) -> Self {
        self.metadata
            .insert(META_PAGE.to_string(), MetaValue::Int(page));
        self
    }

    /// The origin identifier, if tagged.
    pub fn source(&self) -> Option<&str> {
        match self.metadata.get(META_SOURCE) {
            Some(MetaValue::Str(s)) => Some(s),
            _ => None,
        }
    }
}

/// A bounded span of a document's content.
///
/// Chunks inherit their parent document's metadata unchanged. The vector
/// store owns the chunk set for an index build; chunk ids are unique within
/// that build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A ranked search result.
///
/// `score` is BM25 for keyword search, cosine similarity for semantic
/// search, and a fused `[0, 1]` score for hybrid search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_carries_source() {
        let doc = Document::new("body", "manual.pdf");
        assert_eq!(doc.source(), Some("manual.pdf"));
    }

    #[test]
    fn page_metadata_round_trips_through_json() {
        let doc = Document::new("body", "manual.pdf").with_page(3);
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metadata.get(META_PAGE), Some(&MetaValue::Int(3)));
    }

    #[test]
    fn image_list_round_trips_through_json() {
        let mut doc = Document::new("body", "deck.pptx");
        doc.metadata.insert(
            META_IMAGES.to_string(),
            MetaValue::List(vec!["https://cdn.example/a.png".to_string()]),
        );
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.metadata.get(META_IMAGES),
            Some(&MetaValue::List(vec!["https://cdn.example/a.png".to_string()]))
        );
    }
}

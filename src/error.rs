//! Error taxonomy for the retrieval chain.
//!
//! Construction-time errors ([`IngestionError`], [`ChainError::EmptyCorpus`],
//! [`IndexLoadError`], build-time [`EmbeddingError`]) abort initialization:
//! the chain transitions to `Failed` and never reaches `Ready`. Query-time
//! errors are returned to the caller per call; a bad query never poisons the
//! chain. The chain performs no retries itself; backoff for transient
//! provider failures lives inside the embedding providers.

use std::path::PathBuf;

use thiserror::Error;

/// A source that could not be ingested.
///
/// Only the prebuilt loader raises this for missing inputs; the PDF and
/// Markdown loaders skip unreadable sources with a warning so a partially
/// available corpus still produces a usable index.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("companion document file not found for {0}")]
    MissingCompanion(PathBuf),
    #[error("failed to read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("failed to parse {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// An embedding provider call failed (rate limit, network, invalid input).
#[derive(Debug, Error)]
#[error("embedding model '{model}' failed: {reason}")]
pub struct EmbeddingError {
    pub model: String,
    pub reason: String,
}

/// A persisted index is present but cannot be loaded.
///
/// Deliberately fatal: silently rebuilding over a corrupt or mismatched
/// index would mask a misconfiguration and burn embedding quota.
#[derive(Debug, Error)]
pub enum IndexLoadError {
    #[error("required index file missing or empty: {0}")]
    Missing(PathBuf),
    #[error("index file corrupt: {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error(
        "embedding dimensionality mismatch: index was built with {index_dims} dims \
         (model '{index_model}') but query model '{query_model}' produces {query_dims}"
    )]
    DimensionMismatch {
        index_dims: usize,
        index_model: String,
        query_dims: usize,
        query_model: String,
    },
    #[error("index holds {vector_count} vectors but docstore holds {chunk_count} chunks")]
    CountMismatch {
        vector_count: usize,
        chunk_count: usize,
    },
    #[error("failed to read index at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for chain construction and search operations.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error("no chunks produced from the configured sources")]
    EmptyCorpus,
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    IndexLoad(#[from] IndexLoadError),
    #[error("retrieval chain is not ready (state: {0})")]
    NotInitialized(&'static str),
    #[error("failed to persist index: {0}")]
    Persist(#[source] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("chunk/embedding arity mismatch: {chunks} chunks, {embeddings} embeddings")]
    ArityMismatch { chunks: usize, embeddings: usize },
}

//! # docdex
//!
//! A hybrid document retrieval chain: ingest heterogeneous document
//! collections, split them into overlapping chunks, embed and persist them
//! in a flat-file vector index, and answer top-k queries by fusing BM25
//! keyword scores with embedding cosine similarity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌─────────────────────────┐
//! │   Loaders    │──▶│ Chunker  │──▶│   Embed + Persist        │
//! │ pdf/md/pre   │   │ size+ovl │   │ {name}/ vec + docstore   │
//! └──────────────┘   └──────────┘   └───────────┬─────────────┘
//!                                               │
//!                              ┌────────────────┴───────────┐
//!                              ▼                            ▼
//!                        ┌──────────┐                ┌──────────┐
//!                        │  BM25    │                │  cosine  │
//!                        │ lexical  │──── fusion ────│ semantic │
//!                        └──────────┘                └──────────┘
//! ```
//!
//! A [`chain::RetrievalChain`] is built once per process. On startup it
//! either reloads a previously persisted index or runs the full ingest →
//! split → embed → persist pipeline, then serves `search_keyword`,
//! `search_semantic`, and `search_hybrid` from an immutable `Ready` state.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::PathBuf;
//! use docdex::chain::RetrievalChain;
//! use docdex::config::ChainConfig;
//! use docdex::loader::MarkdownLoader;
//!
//! # async fn run() -> Result<(), docdex::error::ChainError> {
//! let config = ChainConfig::from_toml_file(&PathBuf::from("docdex.toml"))?;
//! let mut chain = RetrievalChain::from_config(
//!     config,
//!     vec![PathBuf::from("docs/")],
//!     Box::new(MarkdownLoader::new()),
//! )?;
//! chain.initialize().await?;
//! let hits = chain.search_hybrid("how do I reset my password", None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Construction-time configuration, TOML loading |
//! | [`models`] | Core data types |
//! | [`loader`] | Document ingestion (PDF, Markdown, prebuilt) |
//! | [`chunker`] | Size/overlap text splitting |
//! | [`embedding`] | Embedding provider abstraction (OpenAI, Ollama) |
//! | [`vector_store`] | Persistent vector index |
//! | [`lexical`] | In-memory BM25 index |
//! | [`fusion`] | Score normalization and hybrid fusion |
//! | [`chain`] | Lifecycle orchestration and search entry points |
//! | [`error`] | Error taxonomy |

pub mod chain;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod lexical;
pub mod loader;
pub mod models;
pub mod vector_store;

pub use chain::{ChainState, RetrievalChain};
pub use config::ChainConfig;
pub use error::ChainError;
pub use models::{Chunk, Document, SearchHit};

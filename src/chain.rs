//! Retrieval chain orchestration.
//!
//! A [`RetrievalChain`] owns one persistent vector index and one in-memory
//! lexical index built over the same chunk set, and moves through a strict
//! lifecycle:
//!
//! ```text
//! Uninitialized -> Loading -> Splitting -> Indexing(Building)  -> Ready
//!               \______________________-> Indexing(Reloading) _/
//! ```
//!
//! Any initialization failure lands in the terminal `Failed` state. Reload
//! is chosen over a fresh build iff both persisted index files exist with
//! non-zero size; the decision is made once, at [`RetrievalChain::initialize`],
//! and never revisited. After `Ready` the chain is immutable and all search
//! methods take `&self`, so a `Ready` chain is safe to share across tasks.

use std::path::PathBuf;

use tracing::{debug, info};
use uuid::Uuid;

use crate::chunker::split_documents;
use crate::config::ChainConfig;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::ChainError;
use crate::fusion::fuse;
use crate::lexical::LexicalIndex;
use crate::loader::DocumentLoader;
use crate::models::{Chunk, Document, SearchHit};
use crate::vector_store::VectorStore;

/// Lifecycle state of a [`RetrievalChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Uninitialized,
    Loading,
    Splitting,
    Indexing(IndexingMode),
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingMode {
    /// Fresh build: ingest, split, embed, persist.
    Building,
    /// Rehydrate from the persisted index; no ingestion, no embedding.
    Reloading,
}

impl ChainState {
    pub fn name(&self) -> &'static str {
        match self {
            ChainState::Uninitialized => "uninitialized",
            ChainState::Loading => "loading",
            ChainState::Splitting => "splitting",
            ChainState::Indexing(IndexingMode::Building) => "indexing:building",
            ChainState::Indexing(IndexingMode::Reloading) => "indexing:reloading",
            ChainState::Ready => "ready",
            ChainState::Failed => "failed",
        }
    }
}

/// Hybrid lexical + semantic retrieval over one document corpus.
pub struct RetrievalChain {
    config: ChainConfig,
    sources: Vec<PathBuf>,
    loader: Box<dyn DocumentLoader>,
    document_embedder: Box<dyn EmbeddingProvider>,
    query_embedder: Box<dyn EmbeddingProvider>,
    state: ChainState,
    vector_store: Option<VectorStore>,
    lexical: Option<LexicalIndex>,
}

impl RetrievalChain {
    /// Assemble a chain with explicit embedding providers.
    ///
    /// The chain does nothing until [`initialize`](Self::initialize) runs.
    pub fn new(
        config: ChainConfig,
        sources: Vec<PathBuf>,
        loader: Box<dyn DocumentLoader>,
        document_embedder: Box<dyn EmbeddingProvider>,
        query_embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self {
            config,
            sources,
            loader,
            document_embedder,
            query_embedder,
            state: ChainState::Uninitialized,
            vector_store: None,
            lexical: None,
        })
    }

    /// Assemble a chain whose embedding providers come from the
    /// configuration's `document_embedding` / `query_embedding` sections.
    pub fn from_config(
        config: ChainConfig,
        sources: Vec<PathBuf>,
        loader: Box<dyn DocumentLoader>,
    ) -> Result<Self, ChainError> {
        let document_embedder = create_provider(&config.document_embedding)?;
        let query_embedder = create_provider(&config.query_embedding)?;
        Self::new(config, sources, loader, document_embedder, query_embedder)
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Build or reload the indexes. Runs the full pipeline to completion
    /// before returning; callers serve queries only after it succeeds.
    ///
    /// Idempotent on a `Ready` chain. A chain that has already failed stays
    /// failed: initialization is a once-per-process decision and a retry
    /// would re-run ingestion against state the first attempt may have
    /// partially observed.
    pub async fn initialize(&mut self) -> Result<(), ChainError> {
        match self.state {
            ChainState::Ready => return Ok(()),
            ChainState::Uninitialized => {}
            _ => return Err(ChainError::NotInitialized(self.state.name())),
        }

        match self.run_pipeline().await {
            Ok(()) => {
                self.state = ChainState::Ready;
                info!(
                    index = %self.config.index_name,
                    chunks = self.vector_store.as_ref().map(VectorStore::len).unwrap_or(0),
                    "retrieval chain ready"
                );
                Ok(())
            }
            Err(e) => {
                self.state = ChainState::Failed;
                Err(e)
            }
        }
    }

    async fn run_pipeline(&mut self) -> Result<(), ChainError> {
        let dir = self.config.persist_directory.clone();
        let name = self.config.index_name.clone();

        let store = if VectorStore::exists(&dir, &name) {
            self.state = ChainState::Indexing(IndexingMode::Reloading);
            info!(index = %name, dir = %dir.display(), "reloading persisted index");
            VectorStore::load(
                &dir,
                &name,
                self.query_embedder.model_name(),
                self.query_embedder.dims(),
            )?
        } else {
            self.state = ChainState::Loading;
            info!(loader = self.loader.name(), sources = self.sources.len(), "ingesting sources");
            let documents = self.loader.load(&self.sources)?;

            self.state = ChainState::Splitting;
            let chunks = if self.loader.prechunked() {
                documents.into_iter().map(document_to_chunk).collect()
            } else {
                split_documents(&documents, self.config.chunk_size, self.config.chunk_overlap)
            };
            if chunks.is_empty() {
                return Err(ChainError::EmptyCorpus);
            }

            self.state = ChainState::Indexing(IndexingMode::Building);
            info!(index = %name, chunks = chunks.len(), "building index");
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.document_embedder.embed_documents(&texts).await?;
            let store = VectorStore::build(chunks, embeddings, self.document_embedder.model_name())?;

            std::fs::create_dir_all(&dir).map_err(ChainError::Persist)?;
            store.save(&dir, &name)?;
            store
        };

        self.lexical = Some(LexicalIndex::build(store.chunks()));
        self.vector_store = Some(store);
        Ok(())
    }

    fn ready(&self) -> Result<(&VectorStore, &LexicalIndex), ChainError> {
        match (&self.state, &self.vector_store, &self.lexical) {
            (ChainState::Ready, Some(store), Some(lexical)) => Ok((store, lexical)),
            _ => Err(ChainError::NotInitialized(self.state.name())),
        }
    }

    fn effective_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.config.top_k)
    }

    /// BM25 keyword search. Synchronous: no embedding call involved.
    pub fn search_keyword(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<SearchHit>, ChainError> {
        let (store, lexical) = self.ready()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let hits = lexical.search(query, self.effective_k(k));
        Ok(resolve_hits(store, &hits))
    }

    /// Embedding cosine-similarity search.
    pub async fn search_semantic(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<SearchHit>, ChainError> {
        let (store, _) = self.ready()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_query(query).await?;
        Ok(store.search(&query_vec, self.effective_k(k)))
    }

    /// Fused keyword + semantic search.
    ///
    /// Each side contributes up to `k × candidate_multiplier` candidates so
    /// a chunk ranked just below `k` on one side can still surface once the
    /// other side agrees with it.
    pub async fn search_hybrid(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<SearchHit>, ChainError> {
        let (store, lexical) = self.ready()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let k = self.effective_k(k);
        let candidate_k = k.saturating_mul(self.config.candidate_multiplier);

        let keyword = lexical.search(query, candidate_k);
        let query_vec = self.embed_query(query).await?;
        let semantic = store.search_indices(&query_vec, candidate_k);
        debug!(
            keyword = keyword.len(),
            semantic = semantic.len(),
            candidate_k,
            "hybrid candidate sets"
        );

        let fused = fuse(&keyword, &semantic, self.config.hybrid_alpha, k);
        let chunks = store.chunks();
        Ok(fused
            .into_iter()
            .map(|hit| SearchHit {
                chunk: chunks[hit.index].clone(),
                score: hit.score,
            })
            .collect())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, ChainError> {
        self.query_embedder
            .embed_query(query)
            .await
            .map_err(ChainError::from)
    }
}

fn resolve_hits(store: &VectorStore, hits: &[(usize, f64)]) -> Vec<SearchHit> {
    let chunks = store.chunks();
    hits.iter()
        .map(|(index, score)| SearchHit {
            chunk: chunks[*index].clone(),
            score: *score,
        })
        .collect()
}

/// Prechunked documents skip the splitter; each becomes one chunk as-is.
fn document_to_chunk(doc: Document) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        text: doc.content,
        metadata: doc.metadata,
    }
}

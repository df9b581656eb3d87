//! End-to-end retrieval chain tests over a markdown corpus with a
//! deterministic in-process embedding backend (no network).

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;

use docdex::chain::{ChainState, RetrievalChain};
use docdex::config::{ChainConfig, EmbeddingConfig};
use docdex::embedding::EmbeddingProvider;
use docdex::error::{ChainError, EmbeddingError};
use docdex::loader::{DocumentLoader, MarkdownLoader};

fn init_tracing() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

const DIMS: usize = 64;

/// Deterministic bag-of-words embedding: each token bumps a dimension
/// keyed by a simple rolling hash. Texts sharing vocabulary land close
/// together, which is all the ranking assertions need.
struct StubEmbedder {
    model: String,
}

impl StubEmbedder {
    fn new() -> Self {
        Self {
            model: "stub-embedder".to_string(),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut h: u64 = 1469598103934665603;
            for b in token.bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            v[(h % DIMS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

fn test_config(persist_dir: &Path) -> ChainConfig {
    init_tracing();
    ChainConfig {
        chunk_size: 1000,
        chunk_overlap: 50,
        top_k: 4,
        persist_directory: persist_dir.to_path_buf(),
        index_name: "corpus".to_string(),
        hybrid_alpha: 0.5,
        candidate_multiplier: 2,
        document_embedding: EmbeddingConfig::default(),
        query_embedding: EmbeddingConfig::default(),
    }
}

fn make_chain(persist_dir: &Path, sources: Vec<PathBuf>) -> RetrievalChain {
    RetrievalChain::new(
        test_config(persist_dir),
        sources,
        Box::new(MarkdownLoader::new()),
        Box::new(StubEmbedder::new()),
        Box::new(StubEmbedder::new()),
    )
    .unwrap()
}

/// Three markdown files, each two paragraphs of ~680 characters: splits
/// into exactly 6 chunks at size 1000 / overlap 50.
fn write_corpus(dir: &Path) -> Vec<PathBuf> {
    let topics = [
        ("billing.md", "invoice payment refund charge", "subscription renewal billing cycle"),
        ("login.md", "password reset login account locked", "two factor authentication code"),
        ("shipping.md", "package tracking delivery courier", "customs declaration international"),
    ];
    let mut paths = Vec::new();
    for (name, words_a, words_b) in topics {
        let para = |words: &str| {
            let mut p = String::new();
            while p.len() < 650 {
                p.push_str(words);
                p.push(' ');
            }
            p.truncate(680);
            p
        };
        let content = format!("{}\n\n{}", para(words_a), para(words_b));
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        paths.push(path);
    }
    paths
}

#[tokio::test]
async fn initialize_reaches_ready_and_persists() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut chain = make_chain(persist.path(), sources);
    assert_eq!(chain.state(), ChainState::Uninitialized);
    chain.initialize().await.unwrap();
    assert_eq!(chain.state(), ChainState::Ready);

    assert!(persist.path().join("corpus").join("index.vec").exists());
    assert!(persist.path().join("corpus").join("docstore.json").exists());
}

#[tokio::test]
async fn search_before_initialize_fails() {
    let persist = TempDir::new().unwrap();
    let chain = make_chain(persist.path(), vec![]);

    let err = chain.search_keyword("anything", None).unwrap_err();
    assert!(matches!(err, ChainError::NotInitialized("uninitialized")));
    let err = chain.search_hybrid("anything", None).await.unwrap_err();
    assert!(matches!(err, ChainError::NotInitialized(_)));
}

#[tokio::test]
async fn empty_corpus_fails_initialization() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();

    let mut chain = make_chain(persist.path(), vec![docs.path().to_path_buf()]);
    let err = chain.initialize().await.unwrap_err();
    assert!(matches!(err, ChainError::EmptyCorpus));
    assert_eq!(chain.state(), ChainState::Failed);
}

#[tokio::test]
async fn k_is_clamped_to_corpus_size() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut chain = make_chain(persist.path(), sources);
    chain.initialize().await.unwrap();

    // 3 documents x 2 paragraph chunks = 6 chunks
    let hits = chain.search_hybrid("password invoice tracking", Some(3)).await.unwrap();
    assert_eq!(hits.len(), 3);
    let hits = chain.search_hybrid("password invoice tracking", Some(10)).await.unwrap();
    assert_eq!(hits.len(), 6);
}

#[tokio::test]
async fn results_are_ordered_and_relevant() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut chain = make_chain(persist.path(), sources);
    chain.initialize().await.unwrap();

    for hits in [
        chain.search_keyword("password reset", Some(6)).unwrap(),
        chain.search_semantic("password reset", Some(6)).await.unwrap(),
        chain.search_hybrid("password reset", Some(6)).await.unwrap(),
    ] {
        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(hits[0].chunk.text.contains("password"));
    }
}

#[tokio::test]
async fn hybrid_search_is_deterministic() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut chain = make_chain(persist.path(), sources);
    chain.initialize().await.unwrap();

    let first = chain.search_hybrid("billing cycle renewal", Some(6)).await.unwrap();
    for _ in 0..5 {
        let again = chain.search_hybrid("billing cycle renewal", Some(6)).await.unwrap();
        assert_eq!(first.len(), again.len());
        for (a, b) in first.iter().zip(&again) {
            assert_eq!(a.chunk.id, b.chunk.id);
            assert_eq!(a.score, b.score);
        }
    }
}

#[tokio::test]
async fn chunk_in_both_top_sets_ranks_at_least_as_high_fused() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut chain = make_chain(persist.path(), sources);
    chain.initialize().await.unwrap();

    let query = "password reset login";
    let keyword = chain.search_keyword(query, Some(4)).unwrap();
    let semantic = chain.search_semantic(query, Some(4)).await.unwrap();
    let hybrid = chain.search_hybrid(query, Some(4)).await.unwrap();

    let rank = |hits: &[docdex::SearchHit], id: &str| {
        hits.iter().position(|h| h.chunk.id == id)
    };
    for hit in &keyword {
        if rank(&semantic, &hit.chunk.id).is_some() {
            let kw_rank = rank(&keyword, &hit.chunk.id).unwrap();
            let sem_rank = rank(&semantic, &hit.chunk.id).unwrap();
            let hy_rank = rank(&hybrid, &hit.chunk.id)
                .expect("chunk in both individual top-k sets must appear fused");
            assert!(hy_rank <= kw_rank.min(sem_rank));
        }
    }
}

#[tokio::test]
async fn second_chain_reloads_identical_corpus() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut first = make_chain(persist.path(), sources.clone());
    first.initialize().await.unwrap();
    let first_hits = first.search_hybrid("customs declaration", Some(6)).await.unwrap();

    // second chain sees the persisted files and must not re-ingest
    fs::remove_file(&sources[0]).unwrap();
    let mut second = make_chain(persist.path(), sources);
    second.initialize().await.unwrap();
    assert_eq!(second.state(), ChainState::Ready);

    let second_hits = second.search_hybrid("customs declaration", Some(6)).await.unwrap();
    assert_eq!(first_hits.len(), second_hits.len());
    for (a, b) in first_hits.iter().zip(&second_hits) {
        assert_eq!(a.chunk.id, b.chunk.id);
        assert_eq!(a.chunk.text, b.chunk.text);
        assert!((a.score - b.score).abs() < 1e-9);
    }
}

#[tokio::test]
async fn reload_rejects_mismatched_query_dims() {
    struct WideEmbedder(StubEmbedder);

    #[async_trait]
    impl EmbeddingProvider for WideEmbedder {
        fn model_name(&self) -> &str {
            "wide-embedder"
        }
        fn dims(&self) -> usize {
            DIMS * 2
        }
        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let mut out = self.0.embed_documents(texts).await?;
            for v in &mut out {
                v.extend(std::iter::repeat(0.0).take(DIMS));
            }
            Ok(out)
        }
    }

    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut first = make_chain(persist.path(), sources.clone());
    first.initialize().await.unwrap();

    let mut second = RetrievalChain::new(
        test_config(persist.path()),
        sources,
        Box::new(MarkdownLoader::new()),
        Box::new(WideEmbedder(StubEmbedder::new())),
        Box::new(WideEmbedder(StubEmbedder::new())),
    )
    .unwrap();
    let err = second.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        ChainError::IndexLoad(docdex::error::IndexLoadError::DimensionMismatch { .. })
    ));
    assert_eq!(second.state(), ChainState::Failed);
}

#[tokio::test]
async fn blank_query_returns_no_hits() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let sources = write_corpus(docs.path());

    let mut chain = make_chain(persist.path(), sources);
    chain.initialize().await.unwrap();

    assert!(chain.search_keyword("   ", None).unwrap().is_empty());
    assert!(chain.search_semantic("", None).await.unwrap().is_empty());
    assert!(chain.search_hybrid("\t\n", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_markdown_source_is_skipped_end_to_end() {
    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();
    let mut sources = write_corpus(docs.path());
    sources.push(docs.path().join("ghost.md"));

    let mut chain = make_chain(persist.path(), sources);
    chain.initialize().await.unwrap();
    assert_eq!(chain.state(), ChainState::Ready);

    let hits = chain.search_keyword("invoice", Some(10)).unwrap();
    assert!(!hits.is_empty());
}

#[tokio::test]
async fn prebuilt_corpus_bypasses_chunker_and_keeps_metadata() {
    use docdex::loader::PrebuiltLoader;
    use docdex::models::{Document, MetaValue, META_IMAGES};

    let docs = TempDir::new().unwrap();
    let persist = TempDir::new().unwrap();

    let source = docs.path().join("deck.pdf");
    fs::write(&source, b"%binary placeholder").unwrap();
    let prebuilt = vec![
        {
            let mut d = Document::new(
                "Quarterly revenue grew twelve percent on subscription renewals.",
                "deck.pdf",
            );
            d.metadata.insert(
                META_IMAGES.to_string(),
                MetaValue::List(vec!["https://cdn.example/chart.png".to_string()]),
            );
            d
        },
        Document::new("Customer churn held steady across all regions.", "deck.pdf"),
    ];
    fs::write(
        docs.path().join("deck.docs.json"),
        serde_json::to_vec(&prebuilt).unwrap(),
    )
    .unwrap();

    let mut chain = RetrievalChain::new(
        test_config(persist.path()),
        vec![source],
        Box::new(PrebuiltLoader::new(&["pdf"])),
        Box::new(StubEmbedder::new()),
        Box::new(StubEmbedder::new()),
    )
    .unwrap();
    chain.initialize().await.unwrap();

    // two prebuilt documents, two chunks, no splitting
    let hits = chain.search_keyword("revenue churn", Some(10)).unwrap();
    assert_eq!(hits.len(), 2);
    let revenue = hits
        .iter()
        .find(|h| h.chunk.text.contains("revenue"))
        .unwrap();
    assert!(revenue.chunk.metadata.contains_key(META_IMAGES));
}

#[test]
fn markdown_loader_is_not_prechunked() {
    assert!(!MarkdownLoader::new().prechunked());
}

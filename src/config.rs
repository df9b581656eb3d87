//! Construction-time configuration for the retrieval chain.
//!
//! Everything here is supplied once, before initialization, and never
//! mutated afterwards. [`ChainConfig::from_toml_file`] loads and validates
//! a TOML rendition of the same structure.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ChainError;

/// Configuration for one retrieval chain.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters of overlap between consecutive chunks. Must be < `chunk_size`.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Default number of results when a search call does not specify `k`.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Directory holding the persisted vector index.
    pub persist_directory: PathBuf,
    /// Base name of the index files inside `persist_directory`.
    pub index_name: String,
    /// Weight for semantic vs keyword: `fused = (1-α)·keyword + α·semantic`.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    /// Superset factor for hybrid candidate retrieval (each side fetches
    /// `k × candidate_multiplier` candidates before fusion).
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Backend for document-side embeddings.
    #[serde(default)]
    pub document_embedding: EmbeddingConfig,
    /// Backend for query-side embeddings. May differ from the document side.
    #[serde(default)]
    pub query_embedding: EmbeddingConfig,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_top_k() -> usize {
    4
}
fn default_hybrid_alpha() -> f64 {
    0.5
}
fn default_candidate_multiplier() -> usize {
    2
}

/// Configuration for one embedding backend.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"ollama"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimensionality produced by the model.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Endpoint override (Ollama only; defaults to `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    /// Texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retries for 429/5xx/network errors before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl ChainConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ChainError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChainError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: ChainConfig = toml::from_str(&content).map_err(|e| {
            ChainError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the chain cannot run with.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.chunk_size == 0 {
            return Err(ChainError::Config("chunk_size must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChainError::Config(format!(
                "chunk_overlap ({}) must be strictly less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(ChainError::Config("top_k must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.hybrid_alpha) {
            return Err(ChainError::Config(
                "hybrid_alpha must be in [0.0, 1.0]".into(),
            ));
        }
        if self.candidate_multiplier == 0 {
            return Err(ChainError::Config(
                "candidate_multiplier must be >= 1".into(),
            ));
        }
        if self.index_name.trim().is_empty() {
            return Err(ChainError::Config("index_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ChainConfig {
        ChainConfig {
            chunk_size: 1000,
            chunk_overlap: 50,
            top_k: 4,
            persist_directory: PathBuf::from("/tmp/docdex"),
            index_name: "help_center".to_string(),
            hybrid_alpha: 0.5,
            candidate_multiplier: 2,
            document_embedding: EmbeddingConfig::default(),
            query_embedding: EmbeddingConfig::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn overlap_must_be_less_than_size() {
        let mut config = base_config();
        config.chunk_overlap = 1000;
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));
    }

    #[test]
    fn alpha_outside_unit_interval_rejected() {
        let mut config = base_config();
        config.hybrid_alpha = 1.5;
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));
    }

    #[test]
    fn empty_index_name_rejected() {
        let mut config = base_config();
        config.index_name = "  ".to_string();
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));
    }

    #[test]
    fn toml_round_trip_with_defaults() {
        let toml_src = r#"
persist_directory = "/var/lib/docdex"
index_name = "kbs"

[document_embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
"#;
        let config: ChainConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.document_embedding.dims, Some(1536));
        assert!(config.validate().is_ok());
    }
}

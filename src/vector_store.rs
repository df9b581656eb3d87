//! Persistent vector index store.
//!
//! Pairs each chunk with its embedding vector and persists both under a
//! `(persist_directory, index_name)` key as one directory,
//! `{persist_directory}/{index_name}/`, holding two files:
//!
//! - `index.vec` — binary header plus little-endian f32 vectors
//! - `docstore.json` — the chunk set, in index order
//!
//! The `.vec` header records the document-embedding model's identity and
//! dimensionality plus a SHA-256 checksum of the docstore bytes, so a load
//! can detect truncation, a mismatched file pair, or an embedding model
//! whose output no longer matches the configured query side. Saves are
//! staged in a temporary directory and the pair is published with a single
//! directory rename; a failed save leaves any previous complete index
//! untouched, and the two files always move together.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{ChainError, IndexLoadError};
use crate::models::{Chunk, SearchHit};

const MAGIC: &[u8; 4] = b"DXV1";
const CHECKSUM_LEN: usize = 32;
const INDEX_FILE: &str = "index.vec";
const DOCSTORE_FILE: &str = "docstore.json";

/// An immutable nearest-neighbor index over one chunk set.
pub struct VectorStore {
    model: String,
    dims: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
}

impl VectorStore {
    /// Pair chunks with their embedding vectors.
    ///
    /// Fails with [`ChainError::EmptyCorpus`] for an empty chunk set, and
    /// rejects arity or dimensionality disagreements outright; an index
    /// mixing vector shapes would corrupt every similarity comparison.
    pub fn build(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        model: &str,
    ) -> Result<Self, ChainError> {
        if chunks.is_empty() {
            return Err(ChainError::EmptyCorpus);
        }
        if chunks.len() != embeddings.len() {
            return Err(ChainError::ArityMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let dims = embeddings[0].len();
        if dims == 0 || embeddings.iter().any(|v| v.len() != dims) {
            return Err(ChainError::Config(
                "embedding vectors have inconsistent dimensionality".into(),
            ));
        }
        Ok(Self {
            model: model.to_string(),
            dims,
            vectors: embeddings,
            chunks,
        })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The chunk set, in index order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Identity of the model that produced the document vectors.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// True when both index files exist with non-zero size. This is the
    /// reload-over-rebuild signal; the decision is made once per process.
    pub fn exists(dir: &Path, index_name: &str) -> bool {
        let non_empty = |p: PathBuf| fs::metadata(&p).map(|m| m.len() > 0).unwrap_or(false);
        non_empty(index_path(dir, index_name)) && non_empty(docstore_path(dir, index_name))
    }

    /// Persist atomically: both files are written fully into a staging
    /// directory under `dir`, then the pair is published with a single
    /// directory rename. The persisted state is never a mixture of two
    /// saves, and a failed publish leaves the previous index in place.
    pub fn save(&self, dir: &Path, index_name: &str) -> Result<(), ChainError> {
        fs::create_dir_all(dir).map_err(ChainError::Persist)?;

        let docstore_bytes = serde_json::to_vec(&self.chunks)
            .map_err(|e| ChainError::Persist(std::io::Error::other(e)))?;
        let index_bytes = self.encode_index(&docstore_bytes);

        let staging = dir.join(format!(".{}-staging-{}", index_name, Uuid::new_v4()));
        fs::create_dir_all(&staging).map_err(ChainError::Persist)?;

        let result: Result<(), ChainError> = (|| {
            fs::write(staging.join(DOCSTORE_FILE), &docstore_bytes)
                .map_err(ChainError::Persist)?;
            fs::write(staging.join(INDEX_FILE), &index_bytes).map_err(ChainError::Persist)?;
            publish(&staging, &index_dir(dir, index_name))
        })();

        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result?;

        info!(
            index = index_name,
            dir = %dir.display(),
            chunks = self.chunks.len(),
            dims = self.dims,
            "persisted vector index"
        );
        Ok(())
    }

    /// Reload a persisted index.
    ///
    /// `query_model` / `query_dims` describe the configured query-side
    /// embedding; a dimensionality disagreement is fatal rather than a
    /// trigger to rebuild, since silently re-embedding a corpus could mask
    /// a misconfiguration and waste provider quota.
    pub fn load(
        dir: &Path,
        index_name: &str,
        query_model: &str,
        query_dims: usize,
    ) -> Result<Self, IndexLoadError> {
        let index_file = index_path(dir, index_name);
        let docstore_file = docstore_path(dir, index_name);

        let index_bytes = read_non_empty(&index_file)?;
        let docstore_bytes = read_non_empty(&docstore_file)?;

        let (model, dims, count, checksum, vector_bytes) =
            decode_header(&index_bytes, &index_file)?;

        let actual_checksum: [u8; CHECKSUM_LEN] = Sha256::digest(&docstore_bytes).into();
        if actual_checksum != checksum {
            return Err(IndexLoadError::Corrupt {
                path: docstore_file,
                reason: "docstore does not match the index checksum".to_string(),
            });
        }

        let chunks: Vec<Chunk> =
            serde_json::from_slice(&docstore_bytes).map_err(|e| IndexLoadError::Corrupt {
                path: docstore_file.clone(),
                reason: e.to_string(),
            })?;

        if chunks.len() != count {
            return Err(IndexLoadError::CountMismatch {
                vector_count: count,
                chunk_count: chunks.len(),
            });
        }

        if dims != query_dims {
            return Err(IndexLoadError::DimensionMismatch {
                index_dims: dims,
                index_model: model,
                query_dims,
                query_model: query_model.to_string(),
            });
        }

        if vector_bytes.len() != count * dims * 4 {
            return Err(IndexLoadError::Corrupt {
                path: index_file,
                reason: format!(
                    "expected {} vector bytes, found {}",
                    count * dims * 4,
                    vector_bytes.len()
                ),
            });
        }

        let vectors: Vec<Vec<f32>> = vector_bytes
            .chunks_exact(dims * 4)
            .map(blob_to_vec)
            .collect();

        info!(
            index = index_name,
            dir = %dir.display(),
            chunks = chunks.len(),
            dims,
            model = %model,
            "reloaded vector index"
        );

        Ok(Self {
            model,
            dims,
            vectors,
            chunks,
        })
    }

    /// Nearest neighbors by cosine similarity: at most `min(k, len)` hits,
    /// highest similarity first, ties broken by insertion order.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<SearchHit> {
        self.search_indices(query_vec, k)
            .into_iter()
            .map(|(idx, score)| SearchHit {
                chunk: self.chunks[idx].clone(),
                score,
            })
            .collect()
    }

    /// Like [`search`](Self::search) but yields `(insertion index, score)`
    /// pairs; the fusion layer keys candidates by insertion order.
    pub fn search_indices(&self, query_vec: &[f32], k: usize) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, v)| (idx, cosine_similarity(query_vec, v) as f64))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k.min(self.chunks.len()));
        scored
    }

    fn encode_index(&self, docstore_bytes: &[u8]) -> Vec<u8> {
        let checksum: [u8; CHECKSUM_LEN] = Sha256::digest(docstore_bytes).into();
        let model_bytes = self.model.as_bytes();

        let mut out = Vec::with_capacity(
            4 + 4 + 4 + CHECKSUM_LEN + 4 + model_bytes.len() + self.vectors.len() * self.dims * 4,
        );
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.vectors.len() as u32).to_le_bytes());
        out.extend_from_slice(&checksum);
        out.extend_from_slice(&(model_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(model_bytes);
        for vector in &self.vectors {
            out.extend_from_slice(&vec_to_blob(vector));
        }
        out
    }
}

/// Swap `staging` into place at `target`. An existing index is retired by
/// rename before the swap and restored if the swap fails, so `target` only
/// ever holds a complete pair from a single save.
fn publish(staging: &Path, target: &Path) -> Result<(), ChainError> {
    if !target.exists() {
        return fs::rename(staging, target).map_err(ChainError::Persist);
    }

    let retired = target
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".retired-{}", Uuid::new_v4()));
    fs::rename(target, &retired).map_err(ChainError::Persist)?;
    match fs::rename(staging, target) {
        Ok(()) => {
            let _ = fs::remove_dir_all(&retired);
            Ok(())
        }
        Err(e) => {
            let _ = fs::rename(&retired, target);
            Err(ChainError::Persist(e))
        }
    }
}

fn index_dir(dir: &Path, index_name: &str) -> PathBuf {
    dir.join(index_name)
}

fn index_path(dir: &Path, index_name: &str) -> PathBuf {
    index_dir(dir, index_name).join(INDEX_FILE)
}

fn docstore_path(dir: &Path, index_name: &str) -> PathBuf {
    index_dir(dir, index_name).join(DOCSTORE_FILE)
}

fn read_non_empty(path: &Path) -> Result<Vec<u8>, IndexLoadError> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Err(IndexLoadError::Missing(path.to_path_buf())),
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(IndexLoadError::Missing(path.to_path_buf()))
        }
        Err(e) => Err(IndexLoadError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

type Header<'a> = (String, usize, usize, [u8; CHECKSUM_LEN], &'a [u8]);

fn decode_header<'a>(bytes: &'a [u8], path: &Path) -> Result<Header<'a>, IndexLoadError> {
    let corrupt = |reason: &str| IndexLoadError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let fixed = 4 + 4 + 4 + CHECKSUM_LEN + 4;
    if bytes.len() < fixed {
        return Err(corrupt("header truncated"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(corrupt("bad magic; not a docdex index file"));
    }

    let dims = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&bytes[12..12 + CHECKSUM_LEN]);

    let model_len_at = 12 + CHECKSUM_LEN;
    let model_len = u32::from_le_bytes([
        bytes[model_len_at],
        bytes[model_len_at + 1],
        bytes[model_len_at + 2],
        bytes[model_len_at + 3],
    ]) as usize;

    let model_at = fixed;
    if bytes.len() < model_at + model_len {
        return Err(corrupt("model name truncated"));
    }
    let model = std::str::from_utf8(&bytes[model_at..model_at + model_len])
        .map_err(|_| corrupt("model name is not UTF-8"))?
        .to_string();

    Ok((model, dims, count, checksum, &bytes[model_at + model_len..]))
}

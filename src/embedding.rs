//! Embedding provider abstraction and HTTP backends.
//!
//! [`EmbeddingProvider`] converts chunk text (document side) and query text
//! (query side) into fixed-dimension vectors. The two sides are configured
//! independently and may use different models; the document model's identity
//! and dimensionality are recorded in the persisted index so a reload can
//! detect a mismatch.
//!
//! Backends:
//! - **[`OpenAiProvider`]** — `POST /v1/embeddings`, batched, `OPENAI_API_KEY`.
//! - **[`OllamaProvider`]** — `POST /api/embed` on a local Ollama instance.
//!
//! Both retry transient failures (HTTP 429, 5xx, network errors) with
//! exponential backoff (1s, 2s, 4s, ... capped at 2^5) up to the configured
//! retry budget. Retry policy lives here, at the provider boundary; the
//! chain itself never retries an [`EmbeddingError`].
//!
//! Also provides the vector codec used by the persisted index file
//! ([`vec_to_blob`] / [`blob_to_vec`]) and [`cosine_similarity`].

use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

/// A fixed-dimension text embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality this model produces.
    fn dims(&self) -> usize;

    /// Embed a batch of document chunk texts, one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| EmbeddingError {
            model: self.model_name().to_string(),
            reason: "empty embedding response".to_string(),
        })
    }
}

/// Instantiate a provider from configuration.
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => Err(EmbeddingError {
            model: config.model.clone().unwrap_or_default(),
            reason: format!("unknown embedding provider: '{}'", other),
        }),
    }
}

fn required_model(config: &EmbeddingConfig) -> Result<String, EmbeddingError> {
    config.model.clone().ok_or_else(|| EmbeddingError {
        model: String::new(),
        reason: "embedding model identifier is required".to_string(),
    })
}

fn required_dims(config: &EmbeddingConfig, model: &str) -> Result<usize, EmbeddingError> {
    match config.dims {
        Some(d) if d > 0 => Ok(d),
        _ => Err(EmbeddingError {
            model: model.to_string(),
            reason: "embedding dims must be set and > 0".to_string(),
        }),
    }
}

// ============ OpenAI ============

/// Embedding backend using the OpenAI embeddings API.
pub struct OpenAiProvider {
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = required_model(config)?;
        let dims = required_dims(config, &model)?;
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(EmbeddingError {
                model,
                reason: "OPENAI_API_KEY environment variable not set".to_string(),
            });
        }
        Ok(Self {
            model,
            dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| self.err("OPENAI_API_KEY not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| self.err(&e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| self.err(&e.to_string()))?;
                        return parse_openai_response(&json).map_err(|r| self.err(&r));
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    // 429 and server errors are retryable; other 4xx are not
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(self.err(&format!("HTTP {}: {}", status, body_text)));
                        continue;
                    }
                    return Err(self.err(&format!("HTTP {}: {}", status, body_text)));
                }
                Err(e) => {
                    last_err = Some(self.err(&e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| self.err("embedding failed after retries")))
    }

    fn err(&self, reason: &str) -> EmbeddingError {
        EmbeddingError {
            model: self.model.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

/// Extract `data[].embedding` arrays from an OpenAI embeddings response,
/// re-sorted by `index` so output order matches input order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| "invalid response: missing data array".to_string())?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| "invalid response: missing embedding".to_string())?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| "invalid response: non-numeric embedding value".to_string())
            })
            .collect::<Result<_, _>>()?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedding backend using a local Ollama instance.
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = required_model(config)?;
        let dims = required_dims(config, &model)?;
        Ok(Self {
            model,
            dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| self.err(&e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| self.err(&e.to_string()))?;
                        return parse_ollama_response(&json).map_err(|r| self.err(&r));
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(self.err(&format!("HTTP {}: {}", status, body_text)));
                        continue;
                    }
                    return Err(self.err(&format!("HTTP {}: {}", status, body_text)));
                }
                Err(e) => {
                    last_err = Some(self.err(&format!(
                        "connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| self.err("embedding failed after retries")))
    }

    fn err(&self, reason: &str) -> EmbeddingError {
        EmbeddingError {
            model: self.model.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, String> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| "invalid response: missing embeddings array".to_string())?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| "invalid response: embedding is not an array".to_string())?
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| "invalid response: non-numeric embedding value".to_string())
            })
            .collect::<Result<_, _>>()?;
        result.push(vec);
    }
    Ok(result)
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian f32 bytes. Used by the persisted
/// index file format.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

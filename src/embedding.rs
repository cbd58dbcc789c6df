//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`OpenAiProvider`]** — calls an OpenAI-compatible embeddings API with
//!   batching, retry, and backoff.
//! - **[`HashProvider`]** — deterministic local feature-hashing model; no
//!   network, no model download, stable across runs.
//! - **[`FallbackProvider`]** — tries a primary provider and falls back to a
//!   secondary one; fails only when both fail.
//!
//! Every call returns an [`EmbedBatch`] carrying the model version and
//! dimension that actually produced the vectors. The primary and fallback
//! models have different dimensions, so callers must tag stored vectors
//! with the batch's `model_version` and never mix models in one comparison.
//!
//! # Retry Strategy
//!
//! The remote provider uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::hash::{Hash, Hasher};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use siphasher::sip::SipHasher13;

use crate::config::EmbeddingConfig;
use crate::error::SieveError;

/// Fixed keys for the feature-hashing provider. Changing them changes
/// every embedding, so any change must bump [`HASH_MODEL_VERSION`].
const HASH_SEED_K0: u64 = 0x7465_616d_5f73_6965;
const HASH_SEED_K1: u64 = 0x7665_5f65_6d62_6564;

const HASH_MODEL_VERSION: &str = "feature-hash-v1";

/// Role of a text in asymmetric retrieval.
///
/// Some retrieval models distinguish the query side from the document
/// side via a textual prefix; [`kind_prefix`] maps a model name and kind
/// to that prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Query,
    Document,
}

/// Provider-specific prefix for asymmetric models, if the model needs one.
pub fn kind_prefix(model: &str, kind: EmbedKind) -> Option<&'static str> {
    if model.contains("e5") {
        return Some(match kind {
            EmbedKind::Query => "query: ",
            EmbedKind::Document => "passage: ",
        });
    }
    if model.contains("nomic") {
        return Some(match kind {
            EmbedKind::Query => "search_query: ",
            EmbedKind::Document => "search_document: ",
        });
    }
    None
}

/// One embedding response: the vectors plus the identity of the model
/// that actually produced them (which, under fallback, may not be the
/// configured primary).
#[derive(Debug, Clone)]
pub struct EmbedBatch {
    pub model_version: String,
    pub dims: usize,
    pub vectors: Vec<Vec<f32>>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the preferred model (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Dimensionality of the preferred model.
    fn dims(&self) -> usize;
    /// Embed a batch of texts. Vectors are returned in input order.
    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<EmbedBatch>;
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let batch = provider.embed(&[text.to_string()], EmbedKind::Query).await?;
    batch
        .vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

// ============ OpenAI-compatible Provider ============

/// Embedding provider for an OpenAI-compatible embeddings API.
///
/// Requires the `OPENAI_API_KEY` environment variable. Batches all texts
/// per request and retries transient failures with exponential backoff.
pub struct OpenAiProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for openai provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for openai provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/embeddings".to_string()),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
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

    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<EmbedBatch> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let inputs: Vec<String> = match kind_prefix(&self.model, kind) {
            Some(prefix) => texts.iter().map(|t| format!("{}{}", prefix, t)).collect(),
            None => texts.to_vec(),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let vectors = parse_embeddings_response(&json)?;
                        return Ok(EmbedBatch {
                            model_version: self.model.clone(),
                            dims: self.dims,
                            vectors,
                        });
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("embeddings API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("embeddings API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

/// Parse an OpenAI-style embeddings response: `data[].embedding` arrays
/// in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Feature-Hashing Provider ============

/// Deterministic local embedding via feature hashing.
///
/// Tokens are hashed into a fixed-dimension vector with SipHash13 and a
/// sign trick, then L2-normalized. Lower fidelity than a learned model,
/// but offline, fast, and stable — the designated fallback when the
/// remote provider is unavailable.
pub struct HashProvider {
    model: String,
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self {
            model: HASH_MODEL_VERSION.to_string(),
            dims: dims.max(1),
        }
    }

    fn hash_token(&self, token: &str) -> usize {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dims
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        for raw in text.split_whitespace() {
            let token = raw.to_lowercase();
            let idx = self.hash_token(&token);
            // Sign hashing keeps the expected dot product of unrelated
            // texts near zero.
            let sign = if self.hash_token(&format!("{}_sign", token)) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            vector[idx] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], _kind: EmbedKind) -> Result<EmbedBatch> {
        // Symmetric model: query and document roles embed identically.
        Ok(EmbedBatch {
            model_version: self.model.clone(),
            dims: self.dims,
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
        })
    }
}

// ============ Fallback Provider ============

/// Primary-then-fallback provider chain.
///
/// A primary failure is downgraded to a warning and the fallback is
/// tried; only when both fail does the call surface
/// [`SieveError::EmbeddingUnavailable`], which callers must treat as
/// "could not compute", never as zero similarity.
pub struct FallbackProvider {
    primary: Box<dyn EmbeddingProvider>,
    fallback: Box<dyn EmbeddingProvider>,
}

impl FallbackProvider {
    pub fn new(primary: Box<dyn EmbeddingProvider>, fallback: Box<dyn EmbeddingProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackProvider {
    fn model_name(&self) -> &str {
        self.primary.model_name()
    }

    fn dims(&self) -> usize {
        self.primary.dims()
    }

    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<EmbedBatch> {
        let primary_err = match self.primary.embed(texts, kind).await {
            Ok(batch) => return Ok(batch),
            Err(e) => e,
        };

        eprintln!(
            "warning: primary embedding provider '{}' failed ({}); falling back to '{}'",
            self.primary.model_name(),
            primary_err,
            self.fallback.model_name()
        );

        match self.fallback.embed(texts, kind).await {
            Ok(batch) => Ok(batch),
            Err(fallback_err) => Err(SieveError::EmbeddingUnavailable(format!(
                "primary: {}; fallback: {}",
                primary_err, fallback_err
            ))
            .into()),
        }
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config value | Provider |
/// |--------------|----------|
/// | `"openai"` | [`OpenAiProvider`] |
/// | `"hash"` | [`HashProvider`] |
/// | `"auto"` | [`FallbackProvider`] (openai → hash) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        "hash" => Ok(Box::new(HashProvider::new(config.fallback_dims))),
        "auto" => match OpenAiProvider::new(config) {
            Ok(primary) => Ok(Box::new(FallbackProvider::new(
                Box::new(primary),
                Box::new(HashProvider::new(config.fallback_dims)),
            ))),
            Err(e) => {
                // Primary cannot even be constructed (no API key, bad
                // config); run on the local model alone.
                eprintln!(
                    "warning: primary embedding provider unavailable ({}); using local fallback",
                    e
                );
                Ok(Box::new(HashProvider::new(config.fallback_dims)))
            }
        },
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Vector codec ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes for SQLite storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

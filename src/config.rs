use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::SubjectType;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Chunk size / overlap pair for one subject type.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ChunkProfile {
    pub chunk_size: usize,
    #[serde(default)]
    pub overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_resume_profile")]
    pub resume: ChunkProfile,
    #[serde(default = "default_cover_letter_profile")]
    pub cover_letter: ChunkProfile,
    #[serde(default = "default_repository_profile")]
    pub repository: ChunkProfile,
}

impl ChunkingConfig {
    pub fn profile(&self, subject_type: SubjectType) -> ChunkProfile {
        match subject_type {
            SubjectType::Resume => self.resume,
            SubjectType::CoverLetter => self.cover_letter,
            SubjectType::Repository => self.repository,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            resume: default_resume_profile(),
            cover_letter: default_cover_letter_profile(),
            repository: default_repository_profile(),
        }
    }
}

fn default_resume_profile() -> ChunkProfile {
    ChunkProfile {
        chunk_size: 500,
        overlap: 50,
    }
}
fn default_cover_letter_profile() -> ChunkProfile {
    ChunkProfile {
        chunk_size: 400,
        overlap: 50,
    }
}
fn default_repository_profile() -> ChunkProfile {
    ChunkProfile {
        chunk_size: 800,
        overlap: 80,
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimilarityConfig {
    /// General "these subjects are similar" threshold.
    #[serde(default = "default_similar_threshold")]
    pub similar_threshold: f64,
    /// Stricter near-verbatim threshold; a separate flag from "similar".
    #[serde(default = "default_plagiarism_threshold")]
    pub plagiarism_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// Vector share of the hybrid blend; keyword share is `1 - alpha`.
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    /// Keyword-Jaccard share of field similarity.
    #[serde(default = "default_field_keyword_weight")]
    pub field_keyword_weight: f64,
    /// Sequence-ratio share of field similarity.
    #[serde(default = "default_field_sequence_weight")]
    pub field_sequence_weight: f64,
    /// Per-field weights for the weighted aggregate. Fields absent from
    /// this map default to weight 1.0 at aggregation time.
    #[serde(default)]
    pub field_weights: HashMap<String, f64>,
    /// Per-field "similar" thresholds; fields absent from this map use
    /// `similar_threshold`.
    #[serde(default)]
    pub field_thresholds: HashMap<String, f64>,
    /// Threshold for near-duplicate chunk merging.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k: i64,
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            similar_threshold: default_similar_threshold(),
            plagiarism_threshold: default_plagiarism_threshold(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            hybrid_alpha: default_hybrid_alpha(),
            field_keyword_weight: default_field_keyword_weight(),
            field_sequence_weight: default_field_sequence_weight(),
            field_weights: HashMap::new(),
            field_thresholds: HashMap::new(),
            dedup_threshold: default_dedup_threshold(),
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
        }
    }
}

fn default_similar_threshold() -> f64 {
    0.3
}
fn default_plagiarism_threshold() -> f64 {
    0.8
}
fn default_high_threshold() -> f64 {
    0.8
}
fn default_medium_threshold() -> f64 {
    0.6
}
fn default_hybrid_alpha() -> f64 {
    0.5
}
fn default_field_keyword_weight() -> f64 {
    0.6
}
fn default_field_sequence_weight() -> f64 {
    0.4
}
fn default_dedup_threshold() -> f64 {
    0.8
}
fn default_candidate_k() -> i64 {
    80
}
fn default_final_limit() -> i64 {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai`, `hash`, or `auto` (openai with hash fallback).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Dimension of the local feature-hashing fallback model.
    #[serde(default = "default_fallback_dims")]
    pub fallback_dims: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            fallback_dims: default_fallback_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_fallback_dims() -> usize {
    256
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

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Age in seconds after which a cache entry is stale and must be
    /// re-checked against current hashes before being trusted.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: i64,
    /// Bound on concurrent sub-resource hash fetches.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Glob patterns for structurally significant resources; any change to
    /// a matching path forces a full re-analysis.
    #[serde(default = "default_important_resources")]
    pub important_resources: Vec<String>,
    /// Change ratio above which a full re-analysis is triggered.
    #[serde(default = "default_full_reanalysis_ratio")]
    pub full_reanalysis_ratio: f64,
    /// Number of added resources above which a full re-analysis is triggered.
    #[serde(default = "default_full_reanalysis_added")]
    pub full_reanalysis_added: usize,
    /// Payload fields that participate in the scalar content hash. Fields
    /// not listed (timestamps, fetch bookkeeping) never affect the hash.
    #[serde(default = "default_hash_fields")]
    pub hash_fields: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            fetch_concurrency: default_fetch_concurrency(),
            important_resources: default_important_resources(),
            full_reanalysis_ratio: default_full_reanalysis_ratio(),
            full_reanalysis_added: default_full_reanalysis_added(),
            hash_fields: default_hash_fields(),
        }
    }
}

fn default_max_age_secs() -> i64 {
    86_400
}
fn default_fetch_concurrency() -> usize {
    10
}
fn default_important_resources() -> Vec<String> {
    [
        "README*",
        "Cargo.toml",
        "package.json",
        "requirements.txt",
        "pyproject.toml",
        "go.mod",
        "pom.xml",
        "build.gradle",
        "Dockerfile",
        "Makefile",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_full_reanalysis_ratio() -> f64 {
    0.5
}
fn default_full_reanalysis_added() -> usize {
    10
}
fn default_hash_fields() -> Vec<String> {
    ["summary", "languages", "topics", "counts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Validate a config once at startup so later code can trust it.
pub fn validate(config: &Config) -> Result<()> {
    for (name, profile) in [
        ("resume", config.chunking.resume),
        ("cover_letter", config.chunking.cover_letter),
        ("repository", config.chunking.repository),
    ] {
        if profile.chunk_size == 0 {
            anyhow::bail!("chunking.{}.chunk_size must be > 0", name);
        }
        if profile.overlap >= profile.chunk_size {
            anyhow::bail!(
                "chunking.{}.overlap ({}) must be < chunk_size ({})",
                name,
                profile.overlap,
                profile.chunk_size
            );
        }
    }

    for (name, value) in [
        ("similar_threshold", config.similarity.similar_threshold),
        ("plagiarism_threshold", config.similarity.plagiarism_threshold),
        ("high_threshold", config.similarity.high_threshold),
        ("medium_threshold", config.similarity.medium_threshold),
        ("hybrid_alpha", config.similarity.hybrid_alpha),
        ("dedup_threshold", config.similarity.dedup_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("similarity.{} must be in [0.0, 1.0]", name);
        }
    }

    if config.similarity.medium_threshold > config.similarity.high_threshold {
        anyhow::bail!("similarity.medium_threshold must be <= high_threshold");
    }

    if config.similarity.final_limit < 1 {
        anyhow::bail!("similarity.final_limit must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "openai" | "hash" | "auto" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, hash, or auto.",
            other
        ),
    }

    if matches!(config.embedding.provider.as_str(), "openai" | "auto") {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    if config.embedding.fallback_dims == 0 {
        anyhow::bail!("embedding.fallback_dims must be > 0");
    }

    if config.cache.fetch_concurrency == 0 {
        anyhow::bail!("cache.fetch_concurrency must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.cache.full_reanalysis_ratio) {
        anyhow::bail!("cache.full_reanalysis_ratio must be in [0.0, 1.0]");
    }

    Ok(())
}

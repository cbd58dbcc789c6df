//! Core data models used throughout talent-sieve.
//!
//! These types represent the documents, chunks, similarity verdicts, and
//! cache records that flow through the analysis pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of analysis subject a document belongs to.
///
/// Each subject type has its own chunking profile (see
/// [`ChunkingConfig`](crate::config::ChunkingConfig)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Resume,
    CoverLetter,
    Repository,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Resume => "resume",
            SubjectType::CoverLetter => "cover_letter",
            SubjectType::Repository => "repository",
        }
    }

    pub fn parse(s: &str) -> Option<SubjectType> {
        match s {
            "resume" => Some(SubjectType::Resume),
            "cover_letter" => Some(SubjectType::CoverLetter),
            "repository" => Some(SubjectType::Repository),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A free-text document submitted for analysis.
///
/// Immutable once chunked; a new version of the underlying content is a new
/// `Document` with a new id.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub subject_type: SubjectType,
    pub title: Option<String>,
    pub source: Option<String>,
    pub raw_text: String,
    pub normalized_text: String,
    /// Optional per-field breakdown (e.g. résumé sections), keyed by field
    /// name. Used for field-level similarity scoring.
    pub fields: BTreeMap<String, String>,
    pub created_at: i64,
}

/// Provenance metadata carried by every chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub subject: Option<String>,
    pub title: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub source: Option<String>,
    /// Indices of the chunks folded into this one by near-duplicate
    /// merging. Empty for unmerged chunks; extended (not overwritten) on
    /// each merge.
    #[serde(default)]
    pub merged_from: Vec<i64>,
}

/// A bounded slice of a document's normalized text.
///
/// Chunks are owned by exactly one document and ordered by `chunk_index`;
/// the index order matters for overlap bookkeeping and reconstruction.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    /// SHA-256 of `content`, used for embedding staleness detection.
    pub hash: String,
    pub metadata: ChunkMetadata,
}

/// An embedding vector tied to its owning chunk or document.
///
/// Dimension is constant for a given `model_version`; vectors produced by
/// different models must never be compared directly.
#[derive(Debug, Clone)]
pub struct EmbeddingVector {
    pub owner_id: String,
    pub values: Vec<f32>,
    pub model_version: String,
}

/// How a similarity value was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    Cosine,
    Jaccard,
    Sequence,
    Weighted,
}

/// Coarse similarity classification. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for SimilarityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityLevel::Low => f.write_str("LOW"),
            SimilarityLevel::Medium => f.write_str("MEDIUM"),
            SimilarityLevel::High => f.write_str("HIGH"),
        }
    }
}

/// A pairwise similarity verdict between two subjects.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityScore {
    pub subject_a: String,
    pub subject_b: String,
    /// Field name for per-field scores; `None` for whole-document scores.
    pub field: Option<String>,
    /// In `[0, 1]`.
    pub value: f64,
    pub method: SimilarityMethod,
    pub level: SimilarityLevel,
}

/// Persisted fingerprint of the last analysis of a subject.
///
/// One entry per `repo_key`; upserted, never duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Stable subject identifier, e.g. `username:repo` or
    /// `applicant_id:document_type`.
    pub repo_key: String,
    /// Fingerprint over the normalized key fields of the last analysis.
    pub content_hash: String,
    /// Per-sub-resource hashes for multi-file subjects (empty otherwise).
    pub file_hashes: BTreeMap<String, String>,
    /// Opaque cached analysis result.
    pub analysis_payload: serde_json::Value,
    pub last_checked: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Magnitude classification of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
    Major,
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpactLevel::None => f.write_str("none"),
            ImpactLevel::Low => f.write_str("low"),
            ImpactLevel::Medium => f.write_str("medium"),
            ImpactLevel::High => f.write_str("high"),
            ImpactLevel::Major => f.write_str("major"),
        }
    }
}

/// Derived (never persisted) diff between stored and current hashes.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
    /// `changed / total` over the union of stored and current paths;
    /// 0.0 when the union is empty.
    pub change_ratio: f64,
    pub impact_level: ImpactLevel,
    pub important_resource_changed: bool,
}

impl ChangeReport {
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    pub fn total_count(&self) -> usize {
        self.changed_count() + self.unchanged.len()
    }

    pub fn has_changes(&self) -> bool {
        self.changed_count() > 0
    }
}

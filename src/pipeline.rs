//! Analysis pipeline orchestration.
//!
//! Wires the leaf components together: cache gate → normalize → chunk →
//! embed → near-duplicate merge → persist, plus the two read paths
//! (hybrid corpus search and pairwise document comparison).
//!
//! Normalization, chunking, and scoring are pure CPU-bound functions;
//! only embedding and storage suspend. Concurrent re-analyses of the
//! same subject key must be serialized by the caller — the cache upsert
//! is last-writer-wins.

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::cache::{CacheDecision, ChangeDetectionCache};
use crate::chunk::chunk_document;
use crate::config::Config;
use crate::dedup::{find_duplicate_pairs, merge_similar};
use crate::embedding::{self, EmbedKind, EmbeddingProvider};
use crate::hashes::sha256_hex;
use crate::models::{
    Chunk, Document, EmbeddingVector, SimilarityMethod, SimilarityScore, SubjectType,
};
use crate::normalize;
use crate::score;

/// Pseudo-path under which a single-document subject's text hash is
/// recorded in its cache entry.
const DOCUMENT_RESOURCE: &str = "document";

/// Outcome of [`analyze_document`].
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub document_id: String,
    pub subject_key: String,
    /// True when the cache answered and the expensive steps were skipped.
    pub from_cache: bool,
    pub chunk_count: usize,
    pub merged_chunk_count: usize,
    pub duplicate_pairs: usize,
    /// Model that produced the stored vectors (absent on cache hits).
    pub embedding_model: Option<String>,
    pub payload: serde_json::Value,
}

/// Run (or skip, on a cache hit) the full analysis of a text document.
///
/// The cache is consulted first: a fresh entry short-circuits the whole
/// pipeline; a stale entry is re-checked against the current text hash
/// and only re-analyzed when the text actually changed.
#[allow(clippy::too_many_arguments)]
pub async fn analyze_document(
    config: &Config,
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    cache: &ChangeDetectionCache,
    subject_key: &str,
    subject_type: SubjectType,
    title: Option<String>,
    source: Option<String>,
    raw_text: &str,
    fields: BTreeMap<String, String>,
) -> Result<AnalysisReport> {
    let normalized = normalize::normalize(raw_text);
    let text_hash = sha256_hex(normalized.as_bytes());
    let current_hashes: BTreeMap<String, String> =
        [(DOCUMENT_RESOURCE.to_string(), text_hash)].into_iter().collect();

    match cache.get_cached(subject_key).await? {
        CacheDecision::Fresh(entry) => {
            return Ok(cached_report(subject_key, entry.analysis_payload));
        }
        CacheDecision::Stale(entry) => {
            let report = cache
                .check_for_changes(subject_key, &current_hashes, &[])
                .await?;
            if !report.has_changes() {
                // Hashes still match: the entry is trustworthy again and
                // check_for_changes has already refreshed last_checked.
                return Ok(cached_report(subject_key, entry.analysis_payload));
            }
        }
        CacheDecision::Absent => {}
    }

    // Full analysis.
    let document_id = upsert_document_row(
        pool,
        subject_key,
        subject_type,
        &title,
        &source,
        raw_text,
        &normalized,
        &fields,
    )
    .await?;

    let document = Document {
        id: document_id.clone(),
        subject_type,
        title,
        source,
        raw_text: raw_text.to_string(),
        normalized_text: normalized.clone(),
        fields,
        created_at: chrono::Utc::now().timestamp(),
    };

    let profile = config.chunking.profile(subject_type);
    let chunks = chunk_document(&document, profile.chunk_size, profile.overlap)?;
    let duplicate_pairs =
        find_duplicate_pairs(&chunks, config.similarity.dedup_threshold).len();
    let merged = merge_similar(&chunks, config.similarity.dedup_threshold);

    let contents: Vec<String> = merged.iter().map(|c| c.content.clone()).collect();
    let batch = provider.embed(&contents, EmbedKind::Document).await?;

    let vectors: Vec<EmbeddingVector> = merged
        .iter()
        .zip(batch.vectors.iter())
        .map(|(chunk, values)| EmbeddingVector {
            owner_id: chunk.id.clone(),
            values: values.clone(),
            model_version: batch.model_version.clone(),
        })
        .collect();

    replace_chunks(pool, &document_id, &merged, &vectors, batch.dims).await?;

    let keywords = normalize::extract_keywords(&normalized, 15);
    let payload = serde_json::json!({
        "summary": summary_of(&normalized),
        "topics": keywords,
        "counts": {
            "characters": normalized.chars().count(),
            "chunks": chunks.len(),
            "merged_chunks": merged.len(),
            "duplicate_pairs": duplicate_pairs,
        },
        "document_id": document_id.clone(),
        "model": batch.model_version.clone(),
    });

    cache.save(subject_key, payload.clone(), current_hashes).await?;

    Ok(AnalysisReport {
        document_id,
        subject_key: subject_key.to_string(),
        from_cache: false,
        chunk_count: chunks.len(),
        merged_chunk_count: merged.len(),
        duplicate_pairs,
        embedding_model: Some(batch.model_version),
        payload,
    })
}

fn cached_report(subject_key: &str, payload: serde_json::Value) -> AnalysisReport {
    let document_id = payload
        .get("document_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let counts = payload.get("counts").cloned().unwrap_or_default();
    let count_of = |key: &str| {
        counts
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize
    };

    AnalysisReport {
        document_id,
        subject_key: subject_key.to_string(),
        from_cache: true,
        chunk_count: count_of("chunks"),
        merged_chunk_count: count_of("merged_chunks"),
        duplicate_pairs: count_of("duplicate_pairs"),
        embedding_model: None,
        payload,
    }
}

fn summary_of(normalized: &str) -> String {
    normalized.chars().take(240).collect()
}

// ============ Persistence ============

#[allow(clippy::too_many_arguments)]
async fn upsert_document_row(
    pool: &SqlitePool,
    subject_key: &str,
    subject_type: SubjectType,
    title: &Option<String>,
    source: &Option<String>,
    raw_text: &str,
    normalized_text: &str,
    fields: &BTreeMap<String, String>,
) -> Result<String> {
    let existing_id: Option<String> =
        sqlx::query_scalar("SELECT id FROM documents WHERE subject_key = ?")
            .bind(subject_key)
            .fetch_optional(pool)
            .await?;

    let document_id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let fields_json = serde_json::to_string(fields)?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, subject_key, subject_type, title, source, raw_text, normalized_text, fields_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(subject_key) DO UPDATE SET
            subject_type = excluded.subject_type,
            title = excluded.title,
            source = excluded.source,
            raw_text = excluded.raw_text,
            normalized_text = excluded.normalized_text,
            fields_json = excluded.fields_json
        "#,
    )
    .bind(&document_id)
    .bind(subject_key)
    .bind(subject_type.as_str())
    .bind(title)
    .bind(source)
    .bind(raw_text)
    .bind(normalized_text)
    .bind(&fields_json)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;

    Ok(document_id)
}

/// Replace a document's chunks, FTS rows, and vectors in one transaction.
async fn replace_chunks(
    pool: &SqlitePool,
    document_id: &str,
    chunks: &[Chunk],
    vectors: &[EmbeddingVector],
    dims: usize,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks_fts WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
        let metadata_json = serde_json::to_string(&chunk.metadata)?;
        sqlx::query(
            "INSERT INTO chunks (id, document_id, chunk_index, content, hash, metadata_json) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(&chunk.hash)
        .bind(&metadata_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, content) VALUES (?, ?, ?)")
            .bind(&chunk.id)
            .bind(document_id)
            .bind(&chunk.content)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO chunk_vectors (chunk_id, document_id, embedding, model, dims, content_hash) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&vector.owner_id)
        .bind(document_id)
        .bind(embedding::vec_to_blob(&vector.values))
        .bind(&vector.model_version)
        .bind(dims as i64)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Load a document by id.
pub async fn get_document(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, subject_key, subject_type, title, source, raw_text, normalized_text, fields_json, created_at FROM documents WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let subject_type_str: String = row.get("subject_type");
    let subject_type = SubjectType::parse(&subject_type_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown subject type in store: {}", subject_type_str))?;
    let fields_json: String = row.get("fields_json");

    Ok(Some(Document {
        id: row.get("id"),
        subject_type,
        title: row.get("title"),
        source: row.get("source"),
        raw_text: row.get("raw_text"),
        normalized_text: row.get("normalized_text"),
        fields: serde_json::from_str(&fields_json).unwrap_or_default(),
        created_at: row.get("created_at"),
    }))
}

// ============ Keyword index ============

/// A lexical search hit: subject (document) id plus a raw channel score.
#[derive(Debug, Clone)]
pub struct LexicalCandidate {
    pub subject_id: String,
    pub score: f64,
}

/// Black-box lexical candidate source for hybrid scoring.
///
/// The core only needs `(subject_id, lexical_score)` pairs back; what
/// engine produced them is the implementation's business.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    async fn lexical_candidates(&self, query: &str, limit: i64) -> Result<Vec<LexicalCandidate>>;
}

/// FTS5-backed [`KeywordIndex`] over the `chunks_fts` table.
///
/// The query is reduced to its extracted keywords joined with OR, so
/// free text never reaches the FTS expression parser raw. Per-document
/// scores aggregate chunk hits with MAX.
pub struct FtsKeywordIndex {
    pool: SqlitePool,
}

impl FtsKeywordIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeywordIndex for FtsKeywordIndex {
    async fn lexical_candidates(&self, query: &str, limit: i64) -> Result<Vec<LexicalCandidate>> {
        let keywords = normalize::extract_keywords(query, 12);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = keywords
            .iter()
            .map(|k| format!("\"{}\"", k.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ");

        let rows = sqlx::query(
            r#"
            SELECT document_id, MIN(rank) AS best_rank
            FROM chunks_fts
            WHERE chunks_fts MATCH ?
            GROUP BY document_id
            ORDER BY best_rank
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("best_rank");
                LexicalCandidate {
                    subject_id: row.get("document_id"),
                    score: -rank, // negate so higher = better
                }
            })
            .collect())
    }
}

/// In-memory [`KeywordIndex`] for tests: term-containment counting over
/// `(subject_id, text)` pairs.
pub struct MemoryKeywordIndex {
    subjects: Vec<(String, String)>,
}

impl MemoryKeywordIndex {
    pub fn new(subjects: Vec<(String, String)>) -> Self {
        Self { subjects }
    }
}

#[async_trait]
impl KeywordIndex for MemoryKeywordIndex {
    async fn lexical_candidates(&self, query: &str, limit: i64) -> Result<Vec<LexicalCandidate>> {
        let terms = normalize::extract_keywords(query, 12);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut candidates: Vec<LexicalCandidate> = self
            .subjects
            .iter()
            .filter_map(|(id, text)| {
                let text_lower = text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                if matches > 0 {
                    Some(LexicalCandidate {
                        subject_id: id.clone(),
                        score: matches as f64,
                    })
                } else {
                    None
                }
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.subject_id.cmp(&b.subject_id))
        });
        candidates.truncate(limit as usize);
        Ok(candidates)
    }
}

// ============ Hybrid corpus search ============

/// Find corpus documents similar to `document_id` using hybrid scoring:
/// lexical candidates from `keyword_index` blended with brute-force
/// cosine over stored chunk vectors, `alpha` weighting the vector side.
///
/// Vectors are only compared within the model that embedded the query;
/// documents embedded by a different model are reachable through the
/// lexical channel but contribute no vector score.
pub async fn find_similar(
    config: &Config,
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    keyword_index: &dyn KeywordIndex,
    document_id: &str,
    limit: Option<i64>,
) -> Result<Vec<SimilarityScore>> {
    let document = get_document(pool, document_id)
        .await?
        .with_context(|| format!("No such document: {}", document_id))?;

    let final_limit = limit.unwrap_or(config.similarity.final_limit);
    let alpha = config.similarity.hybrid_alpha;
    let candidate_k = config.similarity.candidate_k;

    let lexical = keyword_index
        .lexical_candidates(&document.normalized_text, candidate_k)
        .await?;
    let vector = vector_candidates(pool, provider, &document.normalized_text, candidate_k).await?;

    // Normalize each channel to [0, 1] before blending.
    let lex_scores: Vec<f64> = lexical.iter().map(|c| c.score).collect();
    let lex_norm = score::min_max_normalize(&lex_scores);
    let lex_map: HashMap<&str, f64> = lexical
        .iter()
        .zip(lex_norm.iter())
        .map(|(c, s)| (c.subject_id.as_str(), *s))
        .collect();

    let vec_scores: Vec<f64> = vector.iter().map(|c| c.score).collect();
    let vec_norm = score::min_max_normalize(&vec_scores);
    let vec_map: HashMap<&str, f64> = vector
        .iter()
        .zip(vec_norm.iter())
        .map(|(c, s)| (c.subject_id.as_str(), *s))
        .collect();

    let mut subject_ids: Vec<&str> = lex_map.keys().chain(vec_map.keys()).copied().collect();
    subject_ids.sort_unstable();
    subject_ids.dedup();

    let mut results: Vec<SimilarityScore> = subject_ids
        .into_iter()
        .filter(|id| *id != document_id)
        .map(|id| {
            let k = lex_map.get(id).copied().unwrap_or(0.0);
            let v = vec_map.get(id).copied().unwrap_or(0.0);
            let value = alpha * v + (1.0 - alpha) * k;
            SimilarityScore {
                subject_a: document_id.to_string(),
                subject_b: id.to_string(),
                field: None,
                value,
                method: SimilarityMethod::Weighted,
                level: score::classify(value, &config.similarity),
            }
        })
        .collect();

    // Sort: score desc, then id asc (deterministic).
    results.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.subject_b.cmp(&b.subject_b))
    });
    results.truncate(final_limit as usize);

    Ok(results)
}

/// Per-document vector scores: embed the query, then brute-force cosine
/// over stored vectors of the same model, aggregating chunks with MAX.
async fn vector_candidates(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    query_text: &str,
    candidate_k: i64,
) -> Result<Vec<LexicalCandidate>> {
    let batch = provider
        .embed(&[query_text.to_string()], EmbedKind::Query)
        .await?;
    let query_vec = batch
        .vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

    let rows = sqlx::query("SELECT document_id, embedding FROM chunk_vectors WHERE model = ?")
        .bind(&batch.model_version)
        .fetch_all(pool)
        .await?;

    let mut best: HashMap<String, f64> = HashMap::new();
    for row in &rows {
        let blob: Vec<u8> = row.get("embedding");
        let vec = embedding::blob_to_vec(&blob);
        let similarity = score::cosine_similarity(&query_vec, &vec) as f64;
        let doc_id: String = row.get("document_id");
        let entry = best.entry(doc_id).or_insert(f64::NEG_INFINITY);
        if similarity > *entry {
            *entry = similarity;
        }
    }

    let mut candidates: Vec<LexicalCandidate> = best
        .into_iter()
        .map(|(subject_id, score)| LexicalCandidate { subject_id, score })
        .collect();
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.subject_id.cmp(&b.subject_id))
    });
    candidates.truncate(candidate_k as usize);
    Ok(candidates)
}

// ============ Pairwise comparison ============

/// Result of comparing two documents field by field.
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub overall: SimilarityScore,
    pub field_scores: Vec<SimilarityScore>,
    /// Fields whose score meets their configured per-field threshold
    /// (falling back to the general similarity threshold).
    pub similar_fields: Vec<String>,
    /// True when the overall score crosses the (stricter) plagiarism
    /// threshold — a separate flag from general similarity.
    pub plagiarism: bool,
    /// True when the overall score crosses the general similarity
    /// threshold.
    pub similar: bool,
}

/// Compare two stored documents.
///
/// When both documents carry field breakdowns, each field in the union
/// is scored (keyword Jaccard + sequence ratio) and the overall value is
/// the weighted aggregate under the configured field weights (weight 1.0
/// where unconfigured). Documents without fields fall back to a single
/// whole-text comparison.
pub async fn compare_documents(
    config: &Config,
    pool: &SqlitePool,
    a_id: &str,
    b_id: &str,
) -> Result<ComparisonReport> {
    let a = get_document(pool, a_id)
        .await?
        .with_context(|| format!("No such document: {}", a_id))?;
    let b = get_document(pool, b_id)
        .await?
        .with_context(|| format!("No such document: {}", b_id))?;

    if a_id == b_id {
        bail!("Cannot compare a document against itself");
    }

    let kw = config.similarity.field_keyword_weight;
    let seq = config.similarity.field_sequence_weight;

    let mut field_names: Vec<String> = a.fields.keys().chain(b.fields.keys()).cloned().collect();
    field_names.sort();
    field_names.dedup();

    let mut field_scores = Vec::new();
    let mut similar_fields = Vec::new();
    let mut scores_map: HashMap<String, f64> = HashMap::new();
    let mut weights_map: HashMap<String, f64> = HashMap::new();

    for name in &field_names {
        let value = score::field_similarity(
            a.fields.get(name).map(String::as_str),
            b.fields.get(name).map(String::as_str),
            kw,
            seq,
        );
        scores_map.insert(name.clone(), value);
        weights_map.insert(
            name.clone(),
            config
                .similarity
                .field_weights
                .get(name)
                .copied()
                .unwrap_or(1.0),
        );
        let field_threshold = config
            .similarity
            .field_thresholds
            .get(name)
            .copied()
            .unwrap_or(config.similarity.similar_threshold);
        if value >= field_threshold {
            similar_fields.push(name.clone());
        }
        field_scores.push(SimilarityScore {
            subject_a: a_id.to_string(),
            subject_b: b_id.to_string(),
            field: Some(name.clone()),
            value,
            method: SimilarityMethod::Weighted,
            level: score::classify(value, &config.similarity),
        });
    }

    let overall_value = if field_names.is_empty() {
        score::field_similarity(
            Some(&a.normalized_text),
            Some(&b.normalized_text),
            kw,
            seq,
        )
    } else {
        score::weighted_aggregate(&scores_map, &weights_map)
    };

    let overall = SimilarityScore {
        subject_a: a_id.to_string(),
        subject_b: b_id.to_string(),
        field: None,
        value: overall_value,
        method: SimilarityMethod::Weighted,
        level: score::classify(overall_value, &config.similarity),
    };

    Ok(ComparisonReport {
        plagiarism: overall_value >= config.similarity.plagiarism_threshold,
        similar: overall_value >= config.similarity.similar_threshold,
        overall,
        field_scores,
        similar_fields,
    })
}

/// Re-analysis scope for a repository subject after a hash check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReanalysisScope {
    /// Cache answered; nothing to reprocess.
    UpToDate,
    /// Only the listed resources need reprocessing.
    Incremental(Vec<String>),
    /// Everything must be reprocessed.
    Full,
}

/// Decide how much of a repository subject needs re-analysis given its
/// current per-file hashes.
pub async fn repository_reanalysis_scope(
    cache: &ChangeDetectionCache,
    repo_key: &str,
    current_hashes: &BTreeMap<String, String>,
    skipped: &[String],
) -> Result<(crate::models::ChangeReport, ReanalysisScope)> {
    let report = cache
        .check_for_changes(repo_key, current_hashes, skipped)
        .await?;

    let scope = if !report.has_changes() {
        ReanalysisScope::UpToDate
    } else if cache.needs_full_reanalysis(&report) {
        ReanalysisScope::Full
    } else {
        let mut changed: Vec<String> = report
            .added
            .iter()
            .chain(report.modified.iter())
            .cloned()
            .collect();
        changed.sort();
        ReanalysisScope::Incremental(changed)
    };

    Ok((report, scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_keyword_index_ranks_by_term_matches() {
        let index = MemoryKeywordIndex::new(vec![
            ("doc-a".to_string(), "rust tokio backend services".to_string()),
            ("doc-b".to_string(), "rust frontend wasm".to_string()),
            ("doc-c".to_string(), "gardening and beekeeping".to_string()),
        ]);

        let candidates = index
            .lexical_candidates("rust tokio services", 10)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].subject_id, "doc-a");
        assert!(candidates[0].score > candidates[1].score);
        assert!(candidates.iter().all(|c| c.subject_id != "doc-c"));
    }

    #[tokio::test]
    async fn memory_keyword_index_empty_query_yields_nothing() {
        let index = MemoryKeywordIndex::new(vec![("doc-a".to_string(), "text".to_string())]);
        assert!(index.lexical_candidates("", 10).await.unwrap().is_empty());
    }

    #[test]
    fn cached_report_reads_counts_from_payload() {
        let payload = serde_json::json!({
            "document_id": "doc-123",
            "counts": {"chunks": 4, "merged_chunks": 3, "duplicate_pairs": 1},
        });
        let report = cached_report("app-1:resume", payload);

        assert!(report.from_cache);
        assert_eq!(report.document_id, "doc-123");
        assert_eq!(report.chunk_count, 4);
        assert_eq!(report.merged_chunk_count, 3);
        assert_eq!(report.duplicate_pairs, 1);
        assert!(report.embedding_model.is_none());
    }

    #[test]
    fn cached_report_tolerates_missing_fields() {
        let report = cached_report("app-1:resume", serde_json::json!({}));
        assert!(report.from_cache);
        assert_eq!(report.document_id, "");
        assert_eq!(report.chunk_count, 0);
    }
}

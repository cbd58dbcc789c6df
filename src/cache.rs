//! Change-detection cache: decides whether expensive re-analysis can be
//! skipped, and how big a detected change is.
//!
//! One [`CacheEntry`] is kept per `repo_key`. An entry moves through four
//! states: absent (no entry) → fresh (within `max_age_secs` of its last
//! check) → stale (age exceeded, hashes not yet re-checked) → changed
//! (re-check found a hash mismatch), returning to fresh after a
//! successful re-analysis and [`ChangeDetectionCache::save`].
//!
//! Storage goes through the [`CacheStore`] trait; the core never touches
//! the database directly. Store failures are fatal for any call that
//! needed a cache decision — treating "unknown" as either fresh or stale
//! would produce wrong re-analysis decisions — so they always propagate
//! as [`SieveError::CacheStore`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sqlx::{Row, SqlitePool};

use crate::config::CacheConfig;
use crate::error::SieveError;
use crate::hashes::sha256_hex;
use crate::models::{CacheEntry, ChangeReport, ImpactLevel};

/// Verdict of a freshness lookup.
#[derive(Debug, Clone)]
pub enum CacheDecision {
    /// No entry; a full analysis is required.
    Absent,
    /// Entry is within `max_age_secs`; the stored payload can be used
    /// without recomputation.
    Fresh(CacheEntry),
    /// Entry exists but aged out; the caller must re-check hashes before
    /// trusting it.
    Stale(CacheEntry),
}

/// Abstract storage backend for cache entries.
///
/// Upserts are atomic per `repo_key` (last writer wins). Concurrent
/// re-analyses of the same key must be serialized by the caller.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, repo_key: &str) -> Result<Option<CacheEntry>>;
    /// Insert or overwrite the entry for `entry.repo_key`.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;
    /// Update only `last_checked` for an existing entry.
    async fn touch(&self, repo_key: &str, last_checked: i64) -> Result<()>;
}

// ============ In-memory store ============

/// In-memory [`CacheStore`] for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, repo_key: &str) -> Result<Option<CacheEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SieveError::CacheStore(e.to_string()))?;
        Ok(entries.get(repo_key).cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SieveError::CacheStore(e.to_string()))?;
        entries.insert(entry.repo_key.clone(), entry.clone());
        Ok(())
    }

    async fn touch(&self, repo_key: &str, last_checked: i64) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SieveError::CacheStore(e.to_string()))?;
        if let Some(entry) = entries.get_mut(repo_key) {
            entry.last_checked = last_checked;
        }
        Ok(())
    }
}

// ============ SQLite store ============

/// SQLite-backed [`CacheStore`] over the `cache_entries` table.
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn store_err(e: impl std::fmt::Display) -> SieveError {
    SieveError::CacheStore(e.to_string())
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, repo_key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT repo_key, content_hash, file_hashes_json, analysis_payload, \
             last_checked, created_at, updated_at FROM cache_entries WHERE repo_key = ?",
        )
        .bind(repo_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let file_hashes_json: String = row.get("file_hashes_json");
        let payload_json: String = row.get("analysis_payload");

        Ok(Some(CacheEntry {
            repo_key: row.get("repo_key"),
            content_hash: row.get("content_hash"),
            file_hashes: serde_json::from_str(&file_hashes_json).map_err(store_err)?,
            analysis_payload: serde_json::from_str(&payload_json).map_err(store_err)?,
            last_checked: row.get("last_checked"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let file_hashes_json = serde_json::to_string(&entry.file_hashes).map_err(store_err)?;
        let payload_json = serde_json::to_string(&entry.analysis_payload).map_err(store_err)?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (repo_key, content_hash, file_hashes_json, analysis_payload, last_checked, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(repo_key) DO UPDATE SET
                content_hash = excluded.content_hash,
                file_hashes_json = excluded.file_hashes_json,
                analysis_payload = excluded.analysis_payload,
                last_checked = excluded.last_checked,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.repo_key)
        .bind(&entry.content_hash)
        .bind(&file_hashes_json)
        .bind(&payload_json)
        .bind(entry.last_checked)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn touch(&self, repo_key: &str, last_checked: i64) -> Result<()> {
        sqlx::query("UPDATE cache_entries SET last_checked = ? WHERE repo_key = ?")
            .bind(last_checked)
            .bind(repo_key)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

// ============ Change detection ============

/// Classify a change ratio into an impact level.
pub fn classify_impact(change_ratio: f64) -> ImpactLevel {
    if change_ratio == 0.0 {
        ImpactLevel::None
    } else if change_ratio < 0.1 {
        ImpactLevel::Low
    } else if change_ratio < 0.3 {
        ImpactLevel::Medium
    } else if change_ratio < 0.6 {
        ImpactLevel::High
    } else {
        ImpactLevel::Major
    }
}

/// Scalar fingerprint of an analysis payload.
///
/// Hashes a canonicalized JSON projection of the payload restricted to
/// `significant_fields` (when the payload is an object carrying at least
/// one of them), so incidental bookkeeping fields like fetch timestamps
/// can never make an unchanged subject look changed. JSON maps serialize
/// with sorted keys, which makes the hash independent of insertion order.
pub fn canonical_content_hash(payload: &serde_json::Value, significant_fields: &[String]) -> String {
    let projected = match payload.as_object() {
        Some(map) if significant_fields.iter().any(|f| map.contains_key(f)) => {
            let mut out = serde_json::Map::new();
            for field in significant_fields {
                if let Some(value) = map.get(field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            serde_json::Value::Object(out)
        }
        _ => payload.clone(),
    };
    sha256_hex(projected.to_string().as_bytes())
}

/// The change-detection service: freshness decisions, hash diffing, and
/// impact classification over a [`CacheStore`].
pub struct ChangeDetectionCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    important: GlobSet,
}

impl ChangeDetectionCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.important_resources {
            builder.add(Glob::new(pattern)?);
        }
        let important = builder.build()?;
        Ok(Self {
            store,
            config,
            important,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Freshness lookup for a subject.
    pub async fn get_cached(&self, repo_key: &str) -> Result<CacheDecision> {
        let entry = match self.store.get(repo_key).await? {
            Some(entry) => entry,
            None => return Ok(CacheDecision::Absent),
        };

        let age = chrono::Utc::now().timestamp() - entry.last_checked;
        if age <= self.config.max_age_secs {
            Ok(CacheDecision::Fresh(entry))
        } else {
            Ok(CacheDecision::Stale(entry))
        }
    }

    /// Re-check a single-hash subject against its stored fingerprint.
    ///
    /// Returns `true` when the subject changed (or has no entry yet).
    /// Refreshes `last_checked` on an unchanged entry.
    pub async fn content_changed(&self, repo_key: &str, current_hash: &str) -> Result<bool> {
        let entry = match self.store.get(repo_key).await? {
            Some(entry) => entry,
            None => return Ok(true),
        };

        if entry.content_hash == current_hash {
            self.store
                .touch(repo_key, chrono::Utc::now().timestamp())
                .await?;
            Ok(false)
        } else {
            Ok(true)
        }
    }

    /// Diff `current_hashes` against the stored per-file hashes and
    /// classify the result.
    ///
    /// `skipped` lists resources whose hash could not be computed this
    /// cycle; those are carried as unchanged rather than deleted. With no
    /// stored entry every current path is reported as added.
    ///
    /// Refreshes `last_checked` when an entry exists, completing the
    /// stale → (fresh | changed) transition.
    pub async fn check_for_changes(
        &self,
        repo_key: &str,
        current_hashes: &BTreeMap<String, String>,
        skipped: &[String],
    ) -> Result<ChangeReport> {
        let entry = self.store.get(repo_key).await?;
        let stored: BTreeMap<String, String> = entry
            .as_ref()
            .map(|e| e.file_hashes.clone())
            .unwrap_or_default();

        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut deleted = Vec::new();
        let mut unchanged = Vec::new();

        for (path, hash) in current_hashes {
            match stored.get(path) {
                Some(old) if old == hash => unchanged.push(path.clone()),
                Some(_) => modified.push(path.clone()),
                None => added.push(path.clone()),
            }
        }

        for path in stored.keys() {
            if current_hashes.contains_key(path) {
                continue;
            }
            if skipped.contains(path) {
                // Fetch failed this cycle: not evidence of deletion.
                unchanged.push(path.clone());
            } else {
                deleted.push(path.clone());
            }
        }

        let changed = added.len() + modified.len() + deleted.len();
        let total = changed + unchanged.len();
        let change_ratio = if total == 0 {
            0.0
        } else {
            changed as f64 / total as f64
        };

        let important_resource_changed = added
            .iter()
            .chain(modified.iter())
            .chain(deleted.iter())
            .any(|path| self.important.is_match(path));

        if entry.is_some() {
            self.store
                .touch(repo_key, chrono::Utc::now().timestamp())
                .await?;
        }

        Ok(ChangeReport {
            added,
            modified,
            deleted,
            unchanged,
            change_ratio,
            impact_level: classify_impact(change_ratio),
            important_resource_changed,
        })
    }

    /// Decide between full and incremental re-analysis after a change.
    ///
    /// Full when a structurally significant resource changed, the change
    /// ratio exceeds the configured bound, or too many resources were
    /// added in one check; otherwise only the changed resources need
    /// reprocessing.
    pub fn needs_full_reanalysis(&self, report: &ChangeReport) -> bool {
        report.important_resource_changed
            || report.change_ratio > self.config.full_reanalysis_ratio
            || report.added.len() > self.config.full_reanalysis_added
    }

    /// Upsert the entry for `repo_key` after a (re-)analysis.
    ///
    /// Always overwrites `content_hash`, `file_hashes`, and `updated_at`;
    /// `created_at` is preserved from a prior entry when one exists.
    pub async fn save(
        &self,
        repo_key: &str,
        analysis_payload: serde_json::Value,
        file_hashes: BTreeMap<String, String>,
    ) -> Result<CacheEntry> {
        let prior = self.store.get(repo_key).await?;
        let now = chrono::Utc::now().timestamp();

        let entry = CacheEntry {
            repo_key: repo_key.to_string(),
            content_hash: canonical_content_hash(&analysis_payload, &self.config.hash_fields),
            file_hashes,
            analysis_payload,
            last_checked: now,
            created_at: prior.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        };

        self.store.put(&entry).await?;
        Ok(entry)
    }
}

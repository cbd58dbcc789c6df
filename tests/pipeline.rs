//! End-to-end pipeline tests over a temporary SQLite database.
//!
//! These use the deterministic feature-hashing embedding provider so the
//! whole flow runs offline and replays identically.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use talent_sieve::cache::{CacheDecision, ChangeDetectionCache, SqliteCacheStore};
use talent_sieve::config::{CacheConfig, ChunkingConfig, Config, DbConfig, EmbeddingConfig, SimilarityConfig};
use talent_sieve::models::{ImpactLevel, SubjectType};
use talent_sieve::pipeline::{
    analyze_document, compare_documents, find_similar, repository_reanalysis_scope,
    FtsKeywordIndex, ReanalysisScope,
};
use talent_sieve::snapshot::{scan_snapshot, SnapshotOptions};
use talent_sieve::{db, embedding, migrate};

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("data").join("sieve.sqlite"),
        },
        chunking: ChunkingConfig::default(),
        similarity: SimilarityConfig::default(),
        embedding: EmbeddingConfig::default(),
        cache: CacheConfig::default(),
    }
}

async fn setup(config: &Config) -> (sqlx::SqlitePool, ChangeDetectionCache) {
    let pool = db::connect(config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let cache = ChangeDetectionCache::new(
        Arc::new(SqliteCacheStore::new(pool.clone())),
        config.cache.clone(),
    )
    .unwrap();
    (pool, cache)
}

const RESUME_A: &str = "Senior Rust engineer with ten years of backend experience. \
    Built async services with tokio and sqlx, designed event driven ingestion pipelines, \
    and led a migration from a monolith to services. Maintains several open source crates.";

const RESUME_B: &str = "Rust backend engineer. Experience with tokio, sqlx, postgres, \
    and event driven architectures. Contributed to open source projects and mentored juniors.";

const RESUME_C: &str = "Pastry chef specializing in laminated doughs and sugar work. \
    Runs a small bakery, teaches weekend croissant workshops, and judges regional competitions.";

#[tokio::test]
async fn analyze_then_reanalyze_hits_cache() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (pool, cache) = setup(&config).await;
    let provider = embedding::create_provider(&config.embedding).unwrap();

    let first = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-1:resume",
        SubjectType::Resume,
        Some("Applicant One".to_string()),
        None,
        RESUME_A,
        BTreeMap::new(),
    )
    .await
    .unwrap();

    assert!(!first.from_cache);
    assert!(first.chunk_count >= 1);
    assert!(first.merged_chunk_count >= 1);
    assert!(first.embedding_model.is_some());

    let second = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-1:resume",
        SubjectType::Resume,
        Some("Applicant One".to_string()),
        None,
        RESUME_A,
        BTreeMap::new(),
    )
    .await
    .unwrap();

    assert!(second.from_cache);
    assert_eq!(second.document_id, first.document_id);
    assert_eq!(second.chunk_count, first.chunk_count);
}

#[tokio::test]
async fn stale_entry_with_unchanged_text_is_not_reanalyzed() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    // Force every entry stale so the hash re-check path runs.
    config.cache.max_age_secs = -1;
    let (pool, cache) = setup(&config).await;
    let provider = embedding::create_provider(&config.embedding).unwrap();

    let first = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-2:resume",
        SubjectType::Resume,
        None,
        None,
        RESUME_A,
        BTreeMap::new(),
    )
    .await
    .unwrap();
    assert!(!first.from_cache);

    let unchanged = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-2:resume",
        SubjectType::Resume,
        None,
        None,
        RESUME_A,
        BTreeMap::new(),
    )
    .await
    .unwrap();
    assert!(unchanged.from_cache);

    let changed = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-2:resume",
        SubjectType::Resume,
        None,
        None,
        RESUME_B,
        BTreeMap::new(),
    )
    .await
    .unwrap();
    assert!(!changed.from_cache);
    // Same subject key keeps the same document id across versions.
    assert_eq!(changed.document_id, first.document_id);
}

#[tokio::test]
async fn hybrid_search_ranks_related_above_unrelated() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (pool, cache) = setup(&config).await;
    let provider = embedding::create_provider(&config.embedding).unwrap();

    let mut ids = Vec::new();
    for (key, text) in [
        ("app-a:resume", RESUME_A),
        ("app-b:resume", RESUME_B),
        ("app-c:resume", RESUME_C),
    ] {
        let report = analyze_document(
            &config,
            &pool,
            provider.as_ref(),
            &cache,
            key,
            SubjectType::Resume,
            None,
            None,
            text,
            BTreeMap::new(),
        )
        .await
        .unwrap();
        ids.push(report.document_id);
    }

    let keyword_index = FtsKeywordIndex::new(pool.clone());
    let results = find_similar(
        &config,
        &pool,
        provider.as_ref(),
        &keyword_index,
        &ids[0],
        None,
    )
    .await
    .unwrap();

    assert!(!results.is_empty());
    // Self is excluded.
    assert!(results.iter().all(|r| r.subject_b != ids[0]));

    let rank_of = |id: &str| results.iter().position(|r| r.subject_b == id);
    let related = rank_of(&ids[1]).expect("related resume should be a candidate");
    if let Some(unrelated) = rank_of(&ids[2]) {
        assert!(related < unrelated, "related resume should outrank the pastry chef");
    }
}

#[tokio::test]
async fn compare_scores_fields_and_flags_plagiarism() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (pool, cache) = setup(&config).await;
    let provider = embedding::create_provider(&config.embedding).unwrap();

    let shared_background = "grew up repairing radios and writing basic on a hand me down computer";
    let fields_a: BTreeMap<String, String> = [
        ("growth_background".to_string(), shared_background.to_string()),
        ("motivation".to_string(), "loves distributed systems".to_string()),
    ]
    .into_iter()
    .collect();
    let fields_b: BTreeMap<String, String> = [
        ("growth_background".to_string(), shared_background.to_string()),
        ("motivation".to_string(), "enjoys competitive cycling races".to_string()),
    ]
    .into_iter()
    .collect();

    let a = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-x:cover_letter",
        SubjectType::CoverLetter,
        None,
        None,
        RESUME_A,
        fields_a,
    )
    .await
    .unwrap();
    let b = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-y:cover_letter",
        SubjectType::CoverLetter,
        None,
        None,
        RESUME_B,
        fields_b,
    )
    .await
    .unwrap();

    let report = compare_documents(&config, &pool, &a.document_id, &b.document_id)
        .await
        .unwrap();

    let growth = report
        .field_scores
        .iter()
        .find(|s| s.field.as_deref() == Some("growth_background"))
        .unwrap();
    assert!((growth.value - 1.0).abs() < 1e-9, "identical field text scores 1.0");

    let motivation = report
        .field_scores
        .iter()
        .find(|s| s.field.as_deref() == Some("motivation"))
        .unwrap();
    assert!(motivation.value < growth.value);

    assert!(report.overall.value > 0.0 && report.overall.value <= 1.0);
    assert!(!report.plagiarism);

    // A verbatim copied field still scores 1.0 even when the other
    // fields differ.
    let clone = analyze_document(
        &config,
        &pool,
        provider.as_ref(),
        &cache,
        "app-z:cover_letter",
        SubjectType::CoverLetter,
        None,
        None,
        RESUME_A,
        [(
            "growth_background".to_string(),
            shared_background.to_string(),
        )]
        .into_iter()
        .collect(),
    )
    .await
    .unwrap();
    let verbatim = compare_documents(&config, &pool, &a.document_id, &clone.document_id)
        .await
        .unwrap();
    let clone_growth = verbatim
        .field_scores
        .iter()
        .find(|s| s.field.as_deref() == Some("growth_background"))
        .unwrap();
    assert!((clone_growth.value - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn sqlite_cache_store_preserves_created_at_across_saves() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (_pool, cache) = setup(&config).await;

    let first = cache
        .save(
            "acme:widgets",
            serde_json::json!({"summary": "v1"}),
            BTreeMap::new(),
        )
        .await
        .unwrap();
    let second = cache
        .save(
            "acme:widgets",
            serde_json::json!({"summary": "v2"}),
            BTreeMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(second.created_at, first.created_at);
    assert_ne!(second.content_hash, first.content_hash);

    match cache.get_cached("acme:widgets").await.unwrap() {
        CacheDecision::Fresh(entry) => {
            assert_eq!(entry.content_hash, second.content_hash);
            assert_eq!(entry.created_at, first.created_at);
        }
        other => panic!("expected fresh entry, got {:?}", other),
    }
}

#[tokio::test]
async fn repository_snapshot_check_classifies_changes() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let (_pool, cache) = setup(&config).await;

    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(repo.join("src")).unwrap();
    std::fs::write(repo.join("Cargo.toml"), "[package]\nname = \"w\"").unwrap();
    for i in 0..6 {
        std::fs::write(repo.join("src").join(format!("m{}.rs", i)), format!("mod m{};", i)).unwrap();
    }

    let hashes = scan_snapshot(&repo, &SnapshotOptions::default()).unwrap();
    cache
        .save(
            "acme:widgets",
            serde_json::json!({"summary": "repo", "counts": {"files": hashes.len()}}),
            hashes.clone(),
        )
        .await
        .unwrap();

    // Unchanged snapshot: up to date.
    let (report, scope) = repository_reanalysis_scope(&cache, "acme:widgets", &hashes, &[])
        .await
        .unwrap();
    assert_eq!(report.impact_level, ImpactLevel::None);
    assert_eq!(scope, ReanalysisScope::UpToDate);

    // One ordinary source file changes: incremental.
    std::fs::write(repo.join("src").join("m0.rs"), "mod m0; // changed").unwrap();
    let hashes = scan_snapshot(&repo, &SnapshotOptions::default()).unwrap();
    let (report, scope) = repository_reanalysis_scope(&cache, "acme:widgets", &hashes, &[])
        .await
        .unwrap();
    assert_eq!(report.modified, vec!["src/m0.rs".to_string()]);
    assert!(!report.important_resource_changed);
    assert_eq!(
        scope,
        ReanalysisScope::Incremental(vec!["src/m0.rs".to_string()])
    );

    // Manifest changes: full re-analysis regardless of ratio.
    std::fs::write(repo.join("Cargo.toml"), "[package]\nname = \"w2\"").unwrap();
    let hashes = scan_snapshot(&repo, &SnapshotOptions::default()).unwrap();
    let (report, scope) = repository_reanalysis_scope(&cache, "acme:widgets", &hashes, &[])
        .await
        .unwrap();
    assert!(report.important_resource_changed);
    assert_eq!(scope, ReanalysisScope::Full);
}

//! # talent-sieve CLI (`sieve`)
//!
//! The `sieve` binary exercises the similarity and caching core from the
//! command line: database initialization, document analysis, pairwise
//! comparison, corpus search, keyword extraction, and cache inspection.
//!
//! ## Usage
//!
//! ```bash
//! sieve --config ./config/sieve.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sieve init` | Create the SQLite database and run schema migrations |
//! | `sieve analyze <file>` | Normalize, chunk, embed, and cache a document |
//! | `sieve compare <id> <id>` | Field-by-field comparison of two documents |
//! | `sieve similar <id>` | Hybrid (keyword + vector) corpus search |
//! | `sieve keywords <file>` | Show the extracted keyword ranking |
//! | `sieve cache status <key>` | Show cache freshness for a subject |
//! | `sieve cache check <key> <dir>` | Diff a snapshot directory against the cache |

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use talent_sieve::cache::{CacheDecision, ChangeDetectionCache, SqliteCacheStore};
use talent_sieve::config::{load_config, Config};
use talent_sieve::models::SubjectType;
use talent_sieve::hashes::{collect_resource_hashes, DirFetcher};
use talent_sieve::pipeline::{self, FtsKeywordIndex, ReanalysisScope};
use talent_sieve::snapshot::{list_snapshot_paths, SnapshotOptions};
use talent_sieve::{db, embedding, migrate, normalize};

/// talent-sieve — document similarity and incremental re-analysis cache
/// for recruitment pipelines.
#[derive(Parser)]
#[command(
    name = "sieve",
    about = "Document similarity and incremental re-analysis cache",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sieve.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Analyze a document file: normalize, chunk, merge near-duplicates,
    /// embed, and record a cache entry. Skips work on a cache hit.
    Analyze {
        /// Path to a text file containing the document.
        file: PathBuf,
        /// Subject type: resume, cover_letter, or repository.
        #[arg(long, default_value = "resume")]
        subject_type: String,
        /// Stable subject key; defaults to `<file-stem>:<subject_type>`.
        #[arg(long)]
        key: Option<String>,
        /// Display title for the subject.
        #[arg(long)]
        title: Option<String>,
    },

    /// Compare two analyzed documents by id.
    Compare { id_a: String, id_b: String },

    /// Find corpus documents similar to the given document id.
    Similar {
        id: String,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show the keyword ranking extracted from a file.
    Keywords {
        file: PathBuf,
        #[arg(long, default_value_t = 20)]
        max: usize,
    },

    /// Cache inspection.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show freshness of a subject's cache entry.
    Status { key: String },
    /// Hash a snapshot directory and diff it against the stored entry.
    Check {
        key: String,
        dir: PathBuf,
        /// Persist the new hashes and payload after the check.
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Analyze {
            file,
            subject_type,
            key,
            title,
        } => run_analyze(&config, &file, &subject_type, key, title).await,
        Commands::Compare { id_a, id_b } => run_compare(&config, &id_a, &id_b).await,
        Commands::Similar { id, limit } => run_similar(&config, &id, limit).await,
        Commands::Keywords { file, max } => run_keywords(&file, max),
        Commands::Cache { command } => match command {
            CacheCommands::Status { key } => run_cache_status(&config, &key).await,
            CacheCommands::Check { key, dir, save } => {
                run_cache_check(&config, &key, &dir, save).await
            }
        },
    }
}

async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("init {}", config.db.path.display());
    println!("ok");
    Ok(())
}

fn build_cache(config: &Config, pool: sqlx::SqlitePool) -> Result<ChangeDetectionCache> {
    ChangeDetectionCache::new(Arc::new(SqliteCacheStore::new(pool)), config.cache.clone())
}

async fn run_analyze(
    config: &Config,
    file: &PathBuf,
    subject_type: &str,
    key: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let subject_type = SubjectType::parse(subject_type)
        .ok_or_else(|| anyhow::anyhow!("Unknown subject type: {}", subject_type))?;

    let raw_text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let subject_key = key.unwrap_or_else(|| format!("{}:{}", stem, subject_type));

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let provider = embedding::create_provider(&config.embedding)?;
    let cache = build_cache(config, pool.clone())?;

    let report = pipeline::analyze_document(
        config,
        &pool,
        provider.as_ref(),
        &cache,
        &subject_key,
        subject_type,
        title.or(Some(stem)),
        Some(file.display().to_string()),
        &raw_text,
        BTreeMap::new(),
    )
    .await?;

    println!("analyze {} ({})", subject_key, subject_type);
    if report.from_cache {
        println!("  cache: hit (analysis skipped)");
    } else {
        println!("  cache: miss");
        println!("  chunks: {}", report.chunk_count);
        println!("  merged chunks: {}", report.merged_chunk_count);
        println!("  duplicate pairs: {}", report.duplicate_pairs);
        if let Some(model) = &report.embedding_model {
            println!("  embedding model: {}", model);
        }
    }
    println!("  document id: {}", report.document_id);
    println!("ok");

    pool.close().await;
    Ok(())
}

async fn run_compare(config: &Config, id_a: &str, id_b: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let report = pipeline::compare_documents(config, &pool, id_a, id_b).await?;

    println!("compare {} vs {}", id_a, id_b);
    for field in &report.field_scores {
        println!(
            "  {}: {:.3} [{}]",
            field.field.as_deref().unwrap_or("(whole)"),
            field.value,
            field.level
        );
    }
    println!(
        "  overall: {:.3} [{}]",
        report.overall.value, report.overall.level
    );
    println!("  similar: {}", if report.similar { "yes" } else { "no" });
    println!(
        "  plagiarism flag: {}",
        if report.plagiarism { "yes" } else { "no" }
    );

    pool.close().await;
    Ok(())
}

async fn run_similar(config: &Config, id: &str, limit: Option<i64>) -> Result<()> {
    let pool = db::connect(config).await?;
    let provider = embedding::create_provider(&config.embedding)?;
    let keyword_index = FtsKeywordIndex::new(pool.clone());

    let results =
        pipeline::find_similar(config, &pool, provider.as_ref(), &keyword_index, id, limit).await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            result.value,
            result.subject_b,
            result.level
        );
    }

    pool.close().await;
    Ok(())
}

fn run_keywords(file: &PathBuf, max: usize) -> Result<()> {
    let raw_text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let normalized = normalize::normalize(&raw_text);
    let keywords = normalize::extract_keywords(&normalized, max);

    if keywords.is_empty() {
        println!("No keywords.");
        return Ok(());
    }
    for keyword in keywords {
        println!("{}", keyword);
    }
    Ok(())
}

async fn run_cache_status(config: &Config, key: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let cache = build_cache(config, pool.clone())?;

    match cache.get_cached(key).await? {
        CacheDecision::Absent => println!("{}: absent (full analysis required)", key),
        CacheDecision::Fresh(entry) => {
            println!("{}: fresh", key);
            println!("  content hash: {}", entry.content_hash);
            println!("  tracked resources: {}", entry.file_hashes.len());
            println!("  last checked: {}", entry.last_checked);
        }
        CacheDecision::Stale(entry) => {
            println!("{}: stale (re-check hashes before trusting)", key);
            println!("  last checked: {}", entry.last_checked);
        }
    }

    pool.close().await;
    Ok(())
}

async fn run_cache_check(config: &Config, key: &str, dir: &PathBuf, save: bool) -> Result<()> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let cache = build_cache(config, pool.clone())?;

    let paths = list_snapshot_paths(dir, &SnapshotOptions::default())?;
    let fetcher = Arc::new(DirFetcher::new(dir.clone()));
    let batch =
        collect_resource_hashes(fetcher, &paths, config.cache.fetch_concurrency).await?;
    let (report, scope) =
        pipeline::repository_reanalysis_scope(&cache, key, &batch.hashes, &batch.skipped).await?;

    println!("check {}", key);
    println!("  added: {}", report.added.len());
    println!("  modified: {}", report.modified.len());
    println!("  deleted: {}", report.deleted.len());
    println!("  unchanged: {}", report.unchanged.len());
    println!("  change ratio: {:.3}", report.change_ratio);
    println!("  impact: {}", report.impact_level);
    println!(
        "  important resource changed: {}",
        if report.important_resource_changed {
            "yes"
        } else {
            "no"
        }
    );
    match &scope {
        ReanalysisScope::UpToDate => println!("  scope: up to date"),
        ReanalysisScope::Incremental(paths) => {
            println!("  scope: incremental ({} resources)", paths.len())
        }
        ReanalysisScope::Full => println!("  scope: full re-analysis"),
    }

    if save {
        let payload = serde_json::json!({
            "summary": format!("snapshot of {}", dir.display()),
            "counts": { "files": batch.hashes.len() },
        });
        cache.save(key, payload, batch.hashes).await?;
        println!("  saved");
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

//! Sub-resource hash collection for multi-file subjects.
//!
//! Fetches each sub-resource of a subject (e.g. the files of a repository)
//! through a [`ResourceFetcher`] and hashes the bytes. Fetches run on a
//! bounded-concurrency pool so the upstream provider is never overwhelmed;
//! a single failed fetch skips that resource instead of aborting the batch.
//!
//! The returned map only ever describes a completed batch. If the caller's
//! future is cancelled mid-collection the map is simply never produced, so
//! a partial hash map cannot be persisted as if it were complete.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Source of sub-resource bytes (repository files, attachment blobs, …).
///
/// Implementations decide what a path means; the hashing layer only needs
/// bytes back or an error.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

/// [`ResourceFetcher`] over a local directory: paths resolve relative to
/// the root (e.g. a checked-out repository snapshot).
pub struct DirFetcher {
    root: std::path::PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ResourceFetcher for DirFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }
}

/// Result of hashing a batch of sub-resources.
#[derive(Debug, Clone)]
pub struct HashBatch {
    /// Path → SHA-256 for every successfully fetched resource.
    pub hashes: BTreeMap<String, String>,
    /// Paths whose fetch failed this cycle. Treated as unchanged by
    /// change detection, not as deleted.
    pub skipped: Vec<String>,
}

/// SHA-256 of a byte slice, hex-encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Build a stable subject key from its two identifying parts,
/// e.g. `username:repo` or `applicant_id:document_type`.
pub fn repo_key(owner: &str, name: &str) -> String {
    format!("{}:{}", owner, name)
}

/// Fetch and hash every path with at most `concurrency` fetches in flight.
///
/// Fetch failures are collected into [`HashBatch::skipped`] and do not
/// cancel sibling fetches. A panicked fetch task is a real error and
/// propagates.
pub async fn collect_resource_hashes(
    fetcher: Arc<dyn ResourceFetcher>,
    paths: &[String],
    concurrency: usize,
) -> Result<HashBatch> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for path in paths {
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        let path = path.clone();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("hash semaphore closed");
            match fetcher.fetch(&path).await {
                Ok(bytes) => (path, Some(sha256_hex(&bytes))),
                Err(e) => {
                    eprintln!("warning: hash fetch failed for '{}': {}", path, e);
                    (path, None)
                }
            }
        });
    }

    let mut hashes = BTreeMap::new();
    let mut skipped = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        let (path, hash) = joined.context("hash fetch task failed")?;
        match hash {
            Some(hash) => {
                hashes.insert(path, hash);
            }
            None => skipped.push(path),
        }
    }

    skipped.sort();
    Ok(HashBatch { hashes, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MapFetcher {
        files: HashMap<String, Vec<u8>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MapFetcher {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ResourceFetcher for MapFetcher {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            let result = self
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such resource: {}", path));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn hashes_all_reachable_resources() {
        let fetcher = Arc::new(MapFetcher::new(&[
            ("src/main.rs", "fn main() {}"),
            ("README.md", "# Project"),
        ]));
        let paths = vec!["src/main.rs".to_string(), "README.md".to_string()];
        let batch = collect_resource_hashes(fetcher, &paths, 10).await.unwrap();

        assert_eq!(batch.hashes.len(), 2);
        assert!(batch.skipped.is_empty());
        assert_eq!(
            batch.hashes["src/main.rs"],
            sha256_hex(b"fn main() {}")
        );
    }

    #[tokio::test]
    async fn failed_fetch_is_skipped_not_fatal() {
        let fetcher = Arc::new(MapFetcher::new(&[("a.py", "print('a')")]));
        let paths = vec!["a.py".to_string(), "missing.py".to_string()];
        let batch = collect_resource_hashes(fetcher, &paths, 10).await.unwrap();

        assert_eq!(batch.hashes.len(), 1);
        assert_eq!(batch.skipped, vec!["missing.py".to_string()]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let files: Vec<(String, String)> = (0..24)
            .map(|i| (format!("file{}.rs", i), format!("contents {}", i)))
            .collect();
        let file_refs: Vec<(&str, &str)> = files
            .iter()
            .map(|(p, c)| (p.as_str(), c.as_str()))
            .collect();
        let fetcher = Arc::new(MapFetcher::new(&file_refs));
        let paths: Vec<String> = files.iter().map(|(p, _)| p.clone()).collect();

        let batch = collect_resource_hashes(Arc::clone(&fetcher) as Arc<dyn ResourceFetcher>, &paths, 3)
            .await
            .unwrap();

        assert_eq!(batch.hashes.len(), 24);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn empty_path_list_is_empty_batch() {
        let fetcher = Arc::new(MapFetcher::new(&[]));
        let batch = collect_resource_hashes(fetcher, &[], 10).await.unwrap();
        assert!(batch.hashes.is_empty());
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn repo_key_joins_parts() {
        assert_eq!(repo_key("acme", "widgets"), "acme:widgets");
        assert_eq!(repo_key("applicant-42", "resume"), "applicant-42:resume");
    }

    #[tokio::test]
    async fn dir_fetcher_reads_relative_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/lib.rs"), "pub fn x() {}").unwrap();

        let fetcher = Arc::new(DirFetcher::new(tmp.path()));
        let batch = collect_resource_hashes(fetcher, &["src/lib.rs".to_string()], 4)
            .await
            .unwrap();
        assert_eq!(batch.hashes["src/lib.rs"], sha256_hex(b"pub fn x() {}"));
    }
}

//! Repository snapshot scanning.
//!
//! Walks a local snapshot of a repository-like subject and produces the
//! `path → sha256` map consumed by change detection. Include/exclude
//! globs bound what counts as part of the subject; oversized or
//! unreadable files are skipped (treated as unchanged for the cycle,
//! same as a failed remote fetch).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::hashes::sha256_hex;

/// Bounds for a snapshot scan.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    /// Files larger than this are skipped (binary blobs, archives).
    pub max_file_bytes: u64,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_globs: vec!["**/*".to_string()],
            exclude_globs: Vec::new(),
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

/// List the sub-resource paths of a snapshot, relative to `root` with
/// `/` separators regardless of platform.
///
/// `.git`, `target`, and `node_modules` are always excluded; oversized
/// and unreadable files are dropped here so every returned path is worth
/// fetching.
pub fn list_snapshot_paths(root: &Path, options: &SnapshotOptions) -> Result<Vec<String>> {
    let include_set = build_globset(&options.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(options.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > options.max_file_bytes => continue,
            Ok(_) => {}
            Err(_) => continue,
        }

        paths.push(rel_str);
    }

    paths.sort();
    Ok(paths)
}

/// Scan `root` into a per-file hash map.
///
/// Synchronous convenience over [`list_snapshot_paths`]; files that
/// disappear between listing and reading are skipped.
pub fn scan_snapshot(root: &Path, options: &SnapshotOptions) -> Result<BTreeMap<String, String>> {
    let mut hashes = BTreeMap::new();

    for rel_str in list_snapshot_paths(root, options)? {
        let bytes = match std::fs::read(root.join(&rel_str)) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        hashes.insert(rel_str, sha256_hex(&bytes));
    }

    Ok(hashes)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

//! Near-duplicate detection and merging within a chunk population.
//!
//! Populations here are per-document (bounded by document length over
//! chunk size), so the O(n²) pairwise scan is deliberate and cheap.

use sha2::{Digest, Sha256};

use crate::models::Chunk;
use crate::score::sequence_similarity;

/// An unordered pair of near-duplicate chunks, by position in the input
/// slice, with the sequence similarity that flagged them.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub first: usize,
    pub second: usize,
    pub similarity: f64,
}

/// Report every unordered pair `(i, j)` whose contents have sequence
/// similarity at or above `threshold`.
pub fn find_duplicate_pairs(chunks: &[Chunk], threshold: f64) -> Vec<DuplicatePair> {
    let mut pairs = Vec::new();
    for i in 0..chunks.len() {
        for j in (i + 1)..chunks.len() {
            let similarity = sequence_similarity(&chunks[i].content, &chunks[j].content);
            if similarity >= threshold {
                pairs.push(DuplicatePair {
                    first: i,
                    second: j,
                    similarity,
                });
            }
        }
    }
    pairs
}

/// Merge near-duplicate chunks into one chunk per cluster.
///
/// Greedy single-pass clustering over chunks in ascending `chunk_index`
/// order (the canonical order — results do not depend on the order the
/// slice was passed in): each not-yet-consumed chunk absorbs every later
/// not-yet-consumed chunk whose similarity to it meets `threshold`.
/// Absorbed content is space-joined in index order; `merged_from`
/// metadata is extended, not overwritten. A chunk similar to nothing
/// passes through unmodified.
pub fn merge_similar(chunks: &[Chunk], threshold: f64) -> Vec<Chunk> {
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    order.sort_by_key(|&i| chunks[i].chunk_index);

    let mut consumed = vec![false; chunks.len()];
    let mut merged = Vec::new();

    for (pos, &i) in order.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;

        let mut cluster = vec![i];
        for &j in &order[pos + 1..] {
            if consumed[j] {
                continue;
            }
            let similarity = sequence_similarity(&chunks[i].content, &chunks[j].content);
            if similarity >= threshold {
                consumed[j] = true;
                cluster.push(j);
            }
        }

        if cluster.len() == 1 {
            merged.push(chunks[i].clone());
        } else {
            merged.push(merge_cluster(chunks, &cluster));
        }
    }

    merged
}

/// Fold a cluster of chunks into a single chunk rooted at the earliest one.
fn merge_cluster(chunks: &[Chunk], cluster: &[usize]) -> Chunk {
    let base = &chunks[cluster[0]];
    let mut out = base.clone();

    let mut content_parts = vec![base.content.clone()];
    for &idx in &cluster[1..] {
        let other = &chunks[idx];
        content_parts.push(other.content.clone());
        out.metadata.merged_from.push(other.chunk_index);
        out.metadata
            .merged_from
            .extend(other.metadata.merged_from.iter().copied());
        if out.metadata.source.is_none() {
            out.metadata.source = other.metadata.source.clone();
        }
        if out.metadata.title.is_none() {
            out.metadata.title = other.metadata.title.clone();
        }
    }

    out.content = content_parts.join(" ");

    let mut hasher = Sha256::new();
    hasher.update(out.content.as_bytes());
    out.hash = format!("{:x}", hasher.finalize());

    out
}

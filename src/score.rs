//! Pairwise similarity scoring.
//!
//! All functions here are pure and deterministic: the same inputs always
//! produce the same score, and malformed inputs (zero vectors, mismatched
//! dimensions, empty fields) degrade to 0.0 instead of raising. "Could not
//! compute" is a distinct outcome handled at the embedding layer, never
//! encoded as a low score here.

use std::collections::{HashMap, HashSet};

use crate::config::SimilarityConfig;
use crate::models::SimilarityLevel;

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or a zero vector on either side.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Jaccard similarity of two keyword sets: `|A∩B| / |A∪B|`.
///
/// Two empty sets are identical absence of content (1.0); one empty set
/// against a non-empty one is 0.0.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Sequence similarity of two strings as the ratio of matching blocks:
/// `2·M / (len(a) + len(b))` where `M` is the total length of the longest
/// matching blocks found by recursive longest-common-substring splitting.
///
/// Two empty strings score 1.0; one empty string scores 0.0.
pub fn sequence_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let matched = total_matching_len(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

/// Total length of matching blocks between `a` and `b`.
///
/// Finds the longest common block, then recurses into the regions to its
/// left and right (expressed as an explicit work queue).
fn total_matching_len(a: &[char], b: &[char]) -> usize {
    let mut queue = vec![(0usize, a.len(), 0usize, b.len())];
    let mut matched = 0usize;

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (i, j, k) = longest_common_block(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        queue.push((alo, i, blo, j));
        queue.push((i + k, ahi, j + k, bhi));
    }

    matched
}

/// Longest common contiguous block within the given sub-ranges.
///
/// Returns `(start_in_a, start_in_b, length)`; ties resolve to the
/// earliest block in `a` (then `b`), keeping results deterministic.
fn longest_common_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0usize);
    // Run lengths of common suffixes ending at the previous row.
    let mut runs: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut next_runs: HashMap<usize, usize> = HashMap::new();
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let run = if j > blo {
                runs.get(&(j - 1)).copied().unwrap_or(0) + 1
            } else {
                1
            };
            next_runs.insert(j, run);
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        runs = next_runs;
    }

    best
}

/// Combined similarity for one named field on two documents:
/// keyword-set Jaccard and sequence similarity, mixed by the configured
/// weights (0.6 / 0.4 by default). A missing or empty field on either
/// side scores 0.0.
pub fn field_similarity(
    a: Option<&str>,
    b: Option<&str>,
    keyword_weight: f64,
    sequence_weight: f64,
) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) if !a.trim().is_empty() && !b.trim().is_empty() => (a, b),
        _ => return 0.0,
    };

    let jaccard = jaccard_similarity(&crate::normalize::keyword_set(a), &crate::normalize::keyword_set(b));
    let sequence = sequence_similarity(a, b);
    let total_weight = keyword_weight + sequence_weight;
    if total_weight <= 0.0 {
        return 0.0;
    }
    (jaccard * keyword_weight + sequence * sequence_weight) / total_weight
}

/// Weighted aggregate of per-field scores: `Σ(score·weight) / Σ(weight)`.
///
/// Fields present in `weights` but missing from `scores` contribute 0.
/// Returns 0.0 when no weights are supplied.
pub fn weighted_aggregate(scores: &HashMap<String, f64>, weights: &HashMap<String, f64>) -> f64 {
    let total_weight: f64 = weights.values().sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted_sum: f64 = weights
        .iter()
        .map(|(field, weight)| scores.get(field).copied().unwrap_or(0.0) * weight)
        .sum();
    weighted_sum / total_weight
}

/// Classify a score against the configured level thresholds.
pub fn classify(value: f64, config: &SimilarityConfig) -> SimilarityLevel {
    if value >= config.high_threshold {
        SimilarityLevel::High
    } else if value >= config.medium_threshold {
        SimilarityLevel::Medium
    } else {
        SimilarityLevel::Low
    }
}

/// Min-max normalize raw channel scores to `[0, 1]`.
///
/// A single candidate, or all-equal scores, normalize to 1.0.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    scores
        .iter()
        .map(|&s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

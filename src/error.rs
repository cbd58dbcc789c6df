//! Typed errors for the contractual failure categories.
//!
//! Most plumbing uses `anyhow::Result`; these variants exist so callers can
//! tell "could not evaluate" apart from a low similarity score, and an
//! invalid configuration apart from an I/O failure.

/// Contractual error categories surfaced to callers.
#[derive(Debug)]
pub enum SieveError {
    /// Invalid chunking or scoring configuration (e.g. `overlap >= chunk_size`).
    Configuration(String),
    /// Both the primary and fallback embedding providers failed. Distinct
    /// from a 0.0 similarity score.
    EmbeddingUnavailable(String),
    /// The cache store could not be read or written. Fatal for any call
    /// that needed a cache decision.
    CacheStore(String),
}

impl std::fmt::Display for SieveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SieveError::Configuration(msg) => write!(f, "invalid configuration: {}", msg),
            SieveError::EmbeddingUnavailable(msg) => {
                write!(f, "embedding unavailable (all providers failed): {}", msg)
            }
            SieveError::CacheStore(msg) => write!(f, "cache store failure: {}", msg),
        }
    }
}

impl std::error::Error for SieveError {}

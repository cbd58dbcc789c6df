//! # talent-sieve
//!
//! Document similarity and incremental re-analysis cache for recruitment
//! pipelines.
//!
//! talent-sieve decides whether two free-text documents (résumés, cover
//! letters, repository snapshots) are similar or near-duplicate, and
//! gates expensive analysis (embedding, scoring, snapshot crawling)
//! behind a content-hash change-detection cache so unchanged subjects
//! are never re-processed.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────────────────────┐   ┌──────────┐
//! │ Documents │──▶│  Normalize → Chunk → Embed   │──▶│  SQLite   │
//! │ snapshots │   │  → Dedup-merge → Score       │   │ FTS5+Vec  │
//! └───────────┘   └──────────────┬──────────────┘   └────┬─────┘
//!                                │ gated by               │
//!                        ┌───────▼────────┐         ┌─────▼────┐
//!                        │ ChangeDetection │         │  CLI     │
//!                        │     Cache       │         │ (sieve)  │
//!                        └────────────────┘         └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`error`] | Contractual error categories |
//! | [`normalize`] | Text normalization and keyword extraction |
//! | [`chunk`] | Sliding-window chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction with fallback |
//! | [`score`] | Cosine, Jaccard, sequence, and aggregate scoring |
//! | [`dedup`] | Near-duplicate chunk detection and merging |
//! | [`cache`] | Change-detection cache and impact classification |
//! | [`hashes`] | Bounded-concurrency sub-resource hashing |
//! | [`snapshot`] | Repository snapshot scanning |
//! | [`pipeline`] | End-to-end orchestration and hybrid search |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod chunk;
pub mod config;
pub mod db;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod hashes;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod score;
pub mod snapshot;

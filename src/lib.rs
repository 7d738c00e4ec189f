//! Demand miner: long-tail keyword discovery from search autocomplete.
//!
//! Candidates are mined from suggestion services and ranked by how much
//! competition they face:
//!
//! Seeds → Suggest expansion (Route A / Route B) → Dedup → Cache → Competition → Rank
//!
//! # Architecture
//!
//! - **Routes**: Route A recursively expands seed terms, descending only into
//!   suggestions that contain a filter term; Route B queries every
//!   combination of rising trends and word groups
//! - **Resolver**: serves fresh cache entries and submits the rest to the
//!   competition source in polled batches
//! - **Ranking**: a pure five-tier classifier (SS/S/A/B/C) over the
//!   competition signal and a watched-domain list
//! - **Cache**: per-profile JSON store with rank-dependent expiry and
//!   periodic checkpoints
//!
//! Upstream services are reached only through the traits of the
//! [`miner_sources`] crate.

pub mod cache;
pub mod config;
pub mod error;
pub mod mining;
pub mod profile;
pub mod rank;
pub mod types;
pub mod word_group;

pub use cache::{CacheEntry, CacheStats, CacheStore, TtlTable};
pub use config::MinerConfig;
pub use error::{MinerError, Result};
pub use mining::{MiningEngine, MiningPlan, RouteSpec, RunReport};
pub use profile::{Profile, list_profiles};
pub use rank::{Rank, RankPolicy, RankReason, WatchList, classify};
pub use types::{Candidate, ErrorKind, Origin, RankedResult, Route, RunError, RunSummary, Stage};
pub use word_group::{WordGroup, normalize_keyword};

//! # miner-sources
//!
//! Upstream adapters for the demand miner.
//!
//! The mining engine consumes three services only through the traits in
//! [`source`]:
//!
//! - [`SuggestionSource`]: autocomplete suggestions for a query
//! - [`TrendSource`]: currently rising search terms for a locale
//! - [`CompetitionSource`]: batch title-match competition analysis
//!
//! [`sources`] holds reference HTTP implementations (Google suggest, the
//! Trends RSS feed, and the Custom Search JSON API).
//!
//! ## Failure policy
//!
//! - Network and HTTP errors surface as [`SourceError::Transient`]
//! - HTTP 429/403 surface as [`SourceError::QuotaExceeded`]
//! - Each adapter fails fast through its own circuit breaker after
//!   repeated failures
//! - Queries are logged at trace level only and API keys never appear in
//!   error messages

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod http;
pub mod source;
pub mod sources;
pub mod types;

pub use config::SourceConfig;
pub use error::{Result, SourceError};
pub use source::{CompetitionSource, SuggestionSource, TrendSource};
pub use types::{BatchHandle, BatchPoll, CompetitionSignal};

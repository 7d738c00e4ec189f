//! Reference HTTP implementations of the source traits.
//!
//! Each adapter builds its HTTP client once, guards its service with a
//! [`crate::circuit_breaker::CircuitBreaker`], and maps HTTP failures onto
//! [`crate::error::SourceError`].

pub mod custom_search;
pub mod google_suggest;
pub mod google_trends;

pub use custom_search::CustomSearchCompetition;
pub use google_suggest::GoogleSuggest;
pub use google_trends::GoogleTrends;

//! Trait definitions for the three upstream services the miner consumes.
//!
//! The mining engine only ever talks to these traits. Reference HTTP
//! implementations live in [`crate::sources`]; tests substitute in-memory
//! mocks.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::types::{BatchHandle, BatchPoll};

/// An autocomplete service.
///
/// All implementations must be `Send + Sync` so an engine can be moved
/// across tasks.
pub trait SuggestionSource: Send + Sync {
    /// Fetch the ordered suggestion list for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transient`] on network/HTTP failure, or
    /// [`SourceError::Parse`] if the response shape is unexpected.
    fn fetch_suggestions(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<String>, SourceError>> + Send;
}

/// A service listing currently rising search terms.
pub trait TrendSource: Send + Sync {
    /// Fetch rising terms for `locale` (a geo code such as `JP`), in the
    /// order the service ranks them, without duplicates.
    ///
    /// # Errors
    ///
    /// Same failure policy as [`SuggestionSource::fetch_suggestions`].
    fn fetch_rising_terms(
        &self,
        locale: &str,
    ) -> impl Future<Output = Result<Vec<String>, SourceError>> + Send;
}

/// A title-match competition analysis service with batch submission and
/// asynchronous completion.
pub trait CompetitionSource: Send + Sync {
    /// Submit `keywords` for analysis. When `date_lower_bound` is set, only
    /// documents published after it count towards the match total.
    ///
    /// # Errors
    ///
    /// [`SourceError::QuotaExceeded`] ends competition lookups for the run;
    /// [`SourceError::Transient`] may be retried.
    fn submit_batch(
        &self,
        keywords: &[String],
        date_lower_bound: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<BatchHandle, SourceError>> + Send;

    /// Poll a submitted batch. Each keyword is reported as ready exactly
    /// once; keywords not yet reported are listed as pending.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`CompetitionSource::submit_batch`].
    fn poll_results(
        &self,
        handle: &BatchHandle,
    ) -> impl Future<Output = Result<BatchPoll, SourceError>> + Send;
}

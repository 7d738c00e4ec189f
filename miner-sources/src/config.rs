//! Adapter configuration with sensible defaults.
//!
//! [`SourceConfig`] controls endpoints, timeouts, locale and request
//! behaviour for the reference adapters. Credentials are never serialized;
//! callers inject them at runtime.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Configuration shared by the reference source adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Autocomplete endpoint (Google suggest, `client=firefox` JSON flavour).
    pub suggest_endpoint: String,
    /// Rising-searches RSS feed endpoint.
    pub trends_endpoint: String,
    /// Custom Search JSON API endpoint.
    pub search_endpoint: String,
    /// Suggest request timeout in seconds.
    pub suggest_timeout_secs: u64,
    /// Trends request timeout in seconds.
    pub trends_timeout_secs: u64,
    /// Custom Search request timeout in seconds.
    pub search_timeout_secs: u64,
    /// Interface language passed as `hl`.
    pub language: String,
    /// Maximum number of rising terms kept from the trends feed. 0 = all.
    pub trend_limit: usize,
    /// Date-restricted probe windows in days, ascending. Used to derive the
    /// most recent matching document's age.
    pub freshness_windows_days: Vec<u32>,
    /// Title-match count above which the date probes are skipped. 0 = no limit.
    pub max_title_matches: u64,
    /// Consecutive failures before an adapter's circuit opens.
    pub breaker_failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a probe request.
    pub breaker_cooldown_secs: u64,
    /// Custom User-Agent string. If `None`, rotates through a built-in list.
    pub user_agent: Option<String>,
    /// Custom Search API key. Injected at runtime, never persisted.
    #[serde(skip)]
    pub search_api_key: Option<String>,
    /// Custom Search engine id (`cx`). Injected at runtime, never persisted.
    #[serde(skip)]
    pub search_engine_id: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            suggest_endpoint: "https://suggestqueries.google.com/complete/search".into(),
            trends_endpoint: "https://trends.google.com/trending/rss".into(),
            search_endpoint: "https://www.googleapis.com/customsearch/v1".into(),
            suggest_timeout_secs: 10,
            trends_timeout_secs: 20,
            search_timeout_secs: 15,
            language: "ja".into(),
            trend_limit: 20,
            freshness_windows_days: vec![1, 7, 30, 90],
            max_title_matches: 0,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 60,
            user_agent: None,
            search_api_key: None,
            search_engine_id: None,
        }
    }
}

impl SourceConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - every timeout must be greater than 0
    /// - endpoints must not be empty
    /// - freshness windows must be non-empty, positive and strictly ascending
    /// - the breaker threshold must be greater than 0
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.suggest_timeout_secs == 0
            || self.trends_timeout_secs == 0
            || self.search_timeout_secs == 0
        {
            return Err(SourceError::Config(
                "timeouts must be greater than 0".into(),
            ));
        }
        for (name, endpoint) in [
            ("suggest_endpoint", &self.suggest_endpoint),
            ("trends_endpoint", &self.trends_endpoint),
            ("search_endpoint", &self.search_endpoint),
        ] {
            if endpoint.trim().is_empty() {
                return Err(SourceError::Config(format!("{name} must not be empty")));
            }
        }
        if self.freshness_windows_days.is_empty() {
            return Err(SourceError::Config(
                "freshness_windows_days must not be empty".into(),
            ));
        }
        if self.freshness_windows_days[0] == 0
            || self
                .freshness_windows_days
                .windows(2)
                .any(|pair| pair[0] >= pair[1])
        {
            return Err(SourceError::Config(
                "freshness_windows_days must be positive and strictly ascending".into(),
            ));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(SourceError::Config(
                "breaker_failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Returns the Custom Search credentials, or a config error naming what
    /// is missing.
    pub fn search_credentials(&self) -> Result<(&str, &str), SourceError> {
        let key = self
            .search_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SourceError::Config("custom search API key is not set".into()))?;
        let cx = self
            .search_engine_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SourceError::Config("custom search engine id is not set".into()))?;
        Ok((key, cx))
    }
}

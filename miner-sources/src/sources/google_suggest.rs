//! Google autocomplete, the suggestion source behind both mining routes.
//!
//! Uses the `client=firefox` flavour of the suggest endpoint, which answers
//! with a bare JSON array: `["query", ["suggestion 1", "suggestion 2", ...]]`.

use serde_json::Value;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::http;
use crate::source::SuggestionSource;

/// Google suggest scraper.
#[derive(Debug)]
pub struct GoogleSuggest {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    breaker: CircuitBreaker,
}

impl GoogleSuggest {
    /// Build the adapter from shared source configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        config.validate()?;
        Ok(Self {
            client: http::build_client(config, config.suggest_timeout_secs)?,
            endpoint: config.suggest_endpoint.clone(),
            language: config.language.clone(),
            breaker: CircuitBreaker::new(
                config.breaker_failure_threshold,
                config.breaker_cooldown_secs,
            ),
        })
    }

    /// Extract suggestions from a suggest response body.
    ///
    /// The query itself is dropped when the service echoes it back.
    fn parse_suggestions(body: &str, query: &str) -> Result<Vec<String>, SourceError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| SourceError::Parse(format!("suggest response is not JSON: {e}")))?;
        let list = value
            .as_array()
            .and_then(|outer| outer.get(1))
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Parse("suggest response has no suggestion list".into()))?;

        let query = query.trim();
        Ok(list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != query)
            .map(str::to_owned)
            .collect())
    }

    async fn fetch(&self, query: &str) -> Result<Vec<String>, SourceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("client", "firefox"), ("q", query), ("hl", self.language.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(http::status_error("suggest", status));
        }
        let body = response.text().await?;
        Self::parse_suggestions(&body, query)
    }
}

impl SuggestionSource for GoogleSuggest {
    async fn fetch_suggestions(&self, query: &str) -> Result<Vec<String>, SourceError> {
        if !self.breaker.should_attempt() {
            return Err(SourceError::Transient("suggest circuit open".into()));
        }
        tracing::trace!(query, "suggest lookup");

        match self.fetch(query).await {
            Ok(suggestions) => {
                self.breaker.record_success();
                tracing::debug!(count = suggestions.len(), "suggest returned");
                Ok(suggestions)
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}

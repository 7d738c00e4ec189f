//! Competition analysis backed by the Google Custom Search JSON API.
//!
//! For every keyword the adapter issues:
//!
//! 1. an `allintitle:` query whose `totalResults` is the match count, and
//! 2. date-restricted probes over the configured freshness windows
//!    (default 1/7/30/90 days), shortest first, stopping at the first window
//!    with any hit. The newest document is then older than the previous
//!    window and no older than the hit window, and the hit window's results
//!    supply the hostnames.
//!
//! Keywords whose title-match count exceeds `max_title_matches` skip the
//! date probes entirely.
//!
//! The API is synchronous, so the batch interface is emulated: submission
//! only queues keywords, and each poll analyses the next queued keyword.
//! A failure mid-batch never discards keywords already reported.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::http;
use crate::source::CompetitionSource;
use crate::types::{BatchHandle, BatchPoll, CompetitionSignal};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchResponse {
    search_information: SearchInformation,
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchInformation {
    total_results: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchItem {
    link: String,
    display_link: String,
}

/// One page of search results, reduced to what ranking needs.
#[derive(Debug)]
struct SearchPage {
    total: u64,
    hosts: BTreeSet<String>,
}

#[derive(Debug)]
struct PendingBatch {
    queue: VecDeque<String>,
    date_lower_bound: Option<DateTime<Utc>>,
}

/// Custom Search backed competition source.
#[derive(Debug)]
pub struct CustomSearchCompetition {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
    windows_days: Vec<u32>,
    max_title_matches: u64,
    breaker: CircuitBreaker,
    next_id: AtomicU64,
    batches: Mutex<HashMap<u64, PendingBatch>>,
}

impl CustomSearchCompetition {
    /// Build the adapter. Requires Custom Search credentials in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if credentials are missing or the
    /// configuration is invalid.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        config.validate()?;
        let (key, cx) = config.search_credentials()?;
        Ok(Self {
            client: http::build_client(config, config.search_timeout_secs)?,
            endpoint: config.search_endpoint.clone(),
            api_key: key.to_owned(),
            engine_id: cx.to_owned(),
            windows_days: config.freshness_windows_days.clone(),
            max_title_matches: config.max_title_matches,
            breaker: CircuitBreaker::new(
                config.breaker_failure_threshold,
                config.breaker_cooldown_secs,
            ),
            next_id: AtomicU64::new(1),
            batches: Mutex::new(HashMap::new()),
        })
    }

    fn parse_page(body: &str) -> Result<SearchPage, SourceError> {
        let response: SearchResponse = serde_json::from_str(body)
            .map_err(|e| SourceError::Parse(format!("search response is not JSON: {e}")))?;

        let raw_total = response.search_information.total_results.trim();
        let total = if raw_total.is_empty() {
            0
        } else {
            raw_total
                .parse()
                .map_err(|_| SourceError::Parse(format!("bad totalResults: {raw_total}")))?
        };

        let hosts = response
            .items
            .iter()
            .filter_map(|item| {
                if item.display_link.is_empty() {
                    Url::parse(&item.link)
                        .ok()
                        .and_then(|u| u.host_str().map(str::to_lowercase))
                } else {
                    Some(item.display_link.to_lowercase())
                }
            })
            .collect();

        Ok(SearchPage { total, hosts })
    }

    async fn search(&self, query: &str, within_days: Option<u32>) -> Result<SearchPage, SourceError> {
        let mut params = vec![
            ("key", self.api_key.clone()),
            ("cx", self.engine_id.clone()),
            ("q", query.to_owned()),
        ];
        if let Some(days) = within_days {
            params.push(("dateRestrict", format!("d{days}")));
        }

        let response = self.client.get(&self.endpoint).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(http::status_error("custom search", status));
        }
        let body = response.text().await?;
        Self::parse_page(&body)
    }

    /// Analyse one keyword into a [`CompetitionSignal`].
    async fn analyze(
        &self,
        keyword: &str,
        date_lower_bound: Option<DateTime<Utc>>,
    ) -> Result<CompetitionSignal, SourceError> {
        let restrict = date_lower_bound.map(|bound| {
            let days = (Utc::now() - bound).num_days().max(1);
            u32::try_from(days).unwrap_or(u32::MAX)
        });
        let count_page = self.search(&format!("allintitle:{keyword}"), restrict).await?;
        if count_page.total == 0 {
            return Ok(CompetitionSignal::empty());
        }
        let undated = CompetitionSignal {
            match_count: count_page.total,
            ..CompetitionSignal::empty()
        };
        if self.max_title_matches > 0 && count_page.total > self.max_title_matches {
            tracing::debug!(keyword, total = count_page.total, "title matches over limit, skipping date probes");
            return Ok(undated);
        }

        let mut previous_window = 0u32;
        for &window in &self.windows_days {
            let page = self.search(keyword, Some(window)).await?;
            if page.total > 0 {
                return Ok(CompetitionSignal {
                    match_count: count_page.total,
                    domains: page.hosts,
                    most_recent_age_hours: Some(f64::from(previous_window) * 24.0),
                    newest_within_hours: Some(f64::from(window) * 24.0),
                });
            }
            previous_window = window;
        }

        Ok(undated)
    }

    fn lock_batches(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<u64, PendingBatch>>, SourceError> {
        self.batches
            .lock()
            .map_err(|_| SourceError::Transient("batch registry poisoned".into()))
    }
}

impl CompetitionSource for CustomSearchCompetition {
    async fn submit_batch(
        &self,
        keywords: &[String],
        date_lower_bound: Option<DateTime<Utc>>,
    ) -> Result<BatchHandle, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_batches()?.insert(
            id,
            PendingBatch {
                queue: keywords.iter().cloned().collect(),
                date_lower_bound,
            },
        );
        tracing::debug!(id, size = keywords.len(), "competition batch queued");
        Ok(BatchHandle {
            id,
            size: keywords.len(),
        })
    }

    async fn poll_results(&self, handle: &BatchHandle) -> Result<BatchPoll, SourceError> {
        let next = {
            let batches = self.lock_batches()?;
            match batches.get(&handle.id) {
                Some(batch) => batch
                    .queue
                    .front()
                    .cloned()
                    .map(|kw| (kw, batch.date_lower_bound)),
                None => None,
            }
        };

        let Some((keyword, bound)) = next else {
            self.lock_batches()?.remove(&handle.id);
            return Ok(BatchPoll::default());
        };

        if !self.breaker.should_attempt() {
            return Err(SourceError::Transient("custom search circuit open".into()));
        }
        let signal = match self.analyze(&keyword, bound).await {
            Ok(signal) => {
                self.breaker.record_success();
                signal
            }
            Err(err) => {
                if !err.is_quota() {
                    self.breaker.record_failure();
                }
                return Err(err);
            }
        };

        let mut batches = self.lock_batches()?;
        let pending = match batches.get_mut(&handle.id) {
            Some(batch) => {
                batch.queue.pop_front();
                batch.queue.iter().cloned().collect::<Vec<_>>()
            }
            None => Vec::new(),
        };
        if pending.is_empty() {
            batches.remove(&handle.id);
        }

        Ok(BatchPoll {
            ready: vec![(keyword, signal)],
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_total_and_hosts() {
        let body = r#"{
            "searchInformation": {"totalResults": "3"},
            "items": [
                {"link": "https://www.example.com/a", "displayLink": "www.Example.com"},
                {"link": "https://blog.other.org/b", "displayLink": ""}
            ]
        }"#;
        let page = CustomSearchCompetition::parse_page(body).expect("parse");
        assert_eq!(page.total, 3);
        assert!(page.hosts.contains("www.example.com"));
        assert!(page.hosts.contains("blog.other.org"));
    }

    #[test]
    fn missing_information_means_zero() {
        let page = CustomSearchCompetition::parse_page("{}").expect("parse");
        assert_eq!(page.total, 0);
        assert!(page.hosts.is_empty());
    }

    #[test]
    fn non_numeric_total_is_parse_error() {
        let body = r#"{"searchInformation": {"totalResults": "many"}}"#;
        let err = CustomSearchCompetition::parse_page(body).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn requires_credentials() {
        let err = CustomSearchCompetition::new(&SourceConfig::default()).unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }
}

//! Shared HTTP client construction with User-Agent rotation.
//!
//! Every adapter builds its own [`reqwest::Client`] once, with the timeout
//! of the service it talks to.

use crate::config::SourceConfig;
use crate::error::SourceError;
use rand::seq::SliceRandom;
use std::time::Duration;

/// Realistic browser User-Agent strings, one picked per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] for one upstream service.
///
/// The client has a cookie store, the given timeout, gzip/brotli
/// decompression, and either the configured User-Agent or a random one
/// from the rotation list.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the client cannot be constructed.
pub fn build_client(
    config: &SourceConfig,
    timeout_secs: u64,
) -> Result<reqwest::Client, SourceError> {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Map a non-success HTTP status to the adapter error taxonomy.
///
/// 429 and 403 mean the service will not answer again this run; everything
/// else is worth a retry.
pub fn status_error(service: &str, status: reqwest::StatusCode) -> SourceError {
    match status.as_u16() {
        429 | 403 => SourceError::QuotaExceeded(format!("{service} returned HTTP {status}")),
        _ => SourceError::Transient(format!("{service} returned HTTP {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_returns_valid_ua() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
        assert!(ua.contains("Mozilla/5.0"));
    }

    #[test]
    fn build_client_with_default_config() {
        let config = SourceConfig::default();
        assert!(build_client(&config, 10).is_ok());
    }

    #[test]
    fn build_client_with_custom_ua() {
        let config = SourceConfig {
            user_agent: Some("DemandMiner/1.0".into()),
            ..Default::default()
        };
        assert!(build_client(&config, 5).is_ok());
    }

    #[test]
    fn quota_statuses_map_to_quota_exceeded() {
        let err = status_error("search", reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert!(err.is_quota());
        let err = status_error("search", reqwest::StatusCode::FORBIDDEN);
        assert!(err.is_quota());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = status_error("suggest", reqwest::StatusCode::BAD_GATEWAY);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("suggest"));
    }
}

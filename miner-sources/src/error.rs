//! Error types for the miner-sources crate.
//!
//! Messages are stable and never include API keys or full request URLs.

/// Errors raised by upstream source adapters.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP-level failure. Retryable.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// The upstream service refused further requests for this run.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The upstream response could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid adapter configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SourceError {
    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the error ends all further lookups against the service.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: it may carry an API key in its query string.
        Self::Transient(err.without_url().to_string())
    }
}

/// Convenience type alias for adapter results.
pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_transient() {
        let err = SourceError::Transient("connection reset".into());
        assert_eq!(err.to_string(), "transient fetch error: connection reset");
    }

    #[test]
    fn display_quota() {
        let err = SourceError::QuotaExceeded("daily limit".into());
        assert_eq!(err.to_string(), "quota exceeded: daily limit");
    }

    #[test]
    fn display_parse() {
        let err = SourceError::Parse("not a JSON array".into());
        assert_eq!(err.to_string(), "parse error: not a JSON array");
    }

    #[test]
    fn display_config() {
        let err = SourceError::Config("timeout must be > 0".into());
        assert_eq!(err.to_string(), "config error: timeout must be > 0");
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(SourceError::Transient("x".into()).is_retryable());
        assert!(!SourceError::QuotaExceeded("x".into()).is_retryable());
        assert!(!SourceError::Parse("x".into()).is_retryable());
        assert!(!SourceError::Config("x".into()).is_retryable());
    }

    #[test]
    fn quota_detection() {
        assert!(SourceError::QuotaExceeded("x".into()).is_quota());
        assert!(!SourceError::Transient("x".into()).is_quota());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SourceError>();
    }
}

//! Configuration types for the demand miner.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use miner_sources::SourceConfig;
use serde::{Deserialize, Serialize};

use crate::cache::TtlTable;
use crate::error::{MinerError, Result};

/// Top-level miner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Expansion limits.
    pub mining: MiningSettings,
    /// Pacing of upstream suggestion calls.
    pub rate_limit: RateLimitSettings,
    /// Persistent result cache.
    pub cache: CacheSettings,
    /// Competition lookup batching and polling.
    pub competition: CompetitionSettings,
    /// Upstream adapter settings.
    pub sources: SourceConfig,
}

/// Expansion limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    /// Route A recursion depth. Depth 0 queries are always issued; values of
    /// 0 or 1 disable recursion.
    pub max_recursion_depth: u32,
}

impl Default for MiningSettings {
    fn default() -> Self {
        Self {
            max_recursion_depth: 3,
        }
    }
}

/// Pacing of upstream suggestion calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Fixed wait before each suggestion call, in milliseconds.
    pub wait_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { wait_ms: 1000 }
    }
}

impl RateLimitSettings {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Persistent result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When false every lookup misses; fresh results are still written.
    pub enabled: bool,
    /// Root directory; each profile gets its own subdirectory.
    pub dir: PathBuf,
    /// TTL used when smart TTL is disabled, in hours.
    pub ttl_hours: u64,
    /// Per-rank TTL table.
    pub smart_ttl: TtlTable,
    /// Flush to disk after this many stored results.
    pub checkpoint_interval: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            ttl_hours: 24,
            smart_ttl: TtlTable::default(),
            checkpoint_interval: 100,
        }
    }
}

/// Competition lookup batching and polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionSettings {
    /// Keywords per submitted batch.
    pub batch_size: usize,
    /// Initial wait after a poll that made no progress, in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound for the poll backoff, in milliseconds.
    pub max_poll_interval_ms: u64,
    /// Give up on a batch after this long, in seconds.
    pub poll_timeout_secs: u64,
    /// Attempts per submit or poll call on transient failures.
    pub max_attempts: u32,
    /// Initial retry delay, doubled per attempt, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Cap applied to reported match counts. 0 disables the cap.
    pub max_match_count: u64,
    /// Only count documents newer than this many days. Unset counts all.
    pub date_lower_bound_days: Option<u32>,
}

impl Default for CompetitionSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval_ms: 500,
            max_poll_interval_ms: 10_000,
            poll_timeout_secs: 900,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            max_match_count: 1_000_000,
            date_lower_bound_days: None,
        }
    }
}

impl CompetitionSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms.max(self.poll_interval_ms))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Absolute lower bound for document dates, relative to `now`.
    pub fn date_lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.date_lower_bound_days
            .map(|days| now - chrono::Duration::days(i64::from(days)))
    }
}

impl MinerConfig {
    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`MinerError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.cache.checkpoint_interval == 0 {
            return Err(MinerError::Config(
                "cache.checkpoint_interval must be at least 1".into(),
            ));
        }
        if self.competition.batch_size == 0 {
            return Err(MinerError::Config(
                "competition.batch_size must be at least 1".into(),
            ));
        }
        if self.competition.max_attempts == 0 {
            return Err(MinerError::Config(
                "competition.max_attempts must be at least 1".into(),
            ));
        }
        if self.competition.poll_timeout_secs == 0 {
            return Err(MinerError::Config(
                "competition.poll_timeout_secs must be at least 1".into(),
            ));
        }
        if self.competition.date_lower_bound_days == Some(0) {
            return Err(MinerError::Config(
                "competition.date_lower_bound_days must be positive when set".into(),
            ));
        }
        self.sources.validate()?;
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| MinerError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MinerError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/demand-miner/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("demand-miner").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("demand-miner")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/demand-miner-config/config.toml")
        }
    }
}

fn default_cache_dir() -> PathBuf {
    if let Some(cache) = std::env::var_os("XDG_CACHE_HOME") {
        PathBuf::from(cache).join("demand-miner")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".cache").join("demand-miner")
    } else {
        PathBuf::from("/tmp/demand-miner-cache")
    }
}

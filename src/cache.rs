//! Rank-aware persistent result cache.
//!
//! One JSON document per profile at `<dir>/<profile>/keyword_cache.json`,
//! keyed by normalized keyword. Entries expire lazily at read time according
//! to the rank they were stored with; nothing is swept in the background.
//! Writes go through a temp file and a rename, and the store flushes itself
//! on drop when it holds unsaved entries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheSettings;
use crate::error::{MinerError, Result};
use crate::rank::Rank;
use crate::types::RankedResult;
use crate::word_group::normalize_keyword;

const CACHE_FILE: &str = "keyword_cache.json";
const CACHE_VERSION: u32 = 1;

/// TTL in hours per rank. A TTL of 0 means the entry is always re-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlTable {
    /// When false, every rank uses the cache-wide default TTL.
    pub enabled: bool,
    pub ss: u64,
    pub s: u64,
    pub a: u64,
    pub b: u64,
    pub c: u64,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            enabled: true,
            ss: 0,
            s: 0,
            a: 24,
            b: 48,
            c: 168,
        }
    }
}

impl TtlTable {
    /// TTL in hours for `rank`, falling back to `default_hours` when the
    /// table is disabled.
    pub fn hours_for(&self, rank: Rank, default_hours: u64) -> u64 {
        if !self.enabled {
            return default_hours;
        }
        match rank {
            Rank::SS => self.ss,
            Rank::S => self.s,
            Rank::A => self.a,
            Rank::B => self.b,
            Rank::C => self.c,
        }
    }
}

/// One cached analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalized keyword.
    pub keyword: String,
    pub result: RankedResult,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    entries: &'a BTreeMap<String, CacheEntry>,
}

/// Fresh and expired entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RankCounts {
    pub fresh: usize,
    pub expired: usize,
}

/// Summary of the cache contents at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub expired: usize,
    pub by_rank: BTreeMap<Rank, RankCounts>,
}

/// Per-profile keyword cache.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    ttl: TtlTable,
    default_ttl_hours: u64,
    lookups_enabled: bool,
    checkpoint_interval: usize,
    since_checkpoint: usize,
    dirty: bool,
}

impl CacheStore {
    /// Path of the cache document for `profile` under `dir`.
    pub fn path_for(dir: &Path, profile: &str) -> PathBuf {
        dir.join(profile).join(CACHE_FILE)
    }

    /// Open the cache for `profile`.
    ///
    /// A missing file yields an empty cache. An unreadable or undecodable
    /// file is moved aside to `keyword_cache.json.corrupt` and the run starts
    /// from an empty cache. If it cannot be moved it is left in place and
    /// replaced by the next flush.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` is kept for callers that chain `?`.
    pub fn open(settings: &CacheSettings, profile: &str) -> Result<Self> {
        Self::open_at(Self::path_for(&settings.dir, profile), settings)
    }

    /// Open a cache document at an explicit path.
    ///
    /// # Errors
    ///
    /// See [`CacheStore::open`].
    pub fn open_at(path: PathBuf, settings: &CacheSettings) -> Result<Self> {
        let entries = match Self::load(&path) {
            Ok(entries) => entries,
            Err(MinerError::CacheCorruption(detail)) => {
                let backup = path.with_extension("json.corrupt");
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    %detail,
                    "cache file corrupt, starting empty"
                );
                if let Err(e) = std::fs::rename(&path, &backup) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "could not move corrupt cache aside, it will be overwritten"
                    );
                }
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        tracing::info!(path = %path.display(), entries = entries.len(), "cache opened");
        Ok(Self {
            path,
            entries,
            ttl: settings.smart_ttl.clone(),
            default_ttl_hours: settings.ttl_hours,
            lookups_enabled: settings.enabled,
            checkpoint_interval: settings.checkpoint_interval.max(1),
            since_checkpoint: 0,
            dirty: false,
        })
    }

    fn load(path: &Path) -> Result<BTreeMap<String, CacheEntry>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(MinerError::CacheCorruption(e.to_string())),
        };
        let file: CacheFile =
            serde_json::from_str(&content).map_err(|e| MinerError::CacheCorruption(e.to_string()))?;
        if file.version != CACHE_VERSION {
            return Err(MinerError::CacheCorruption(format!(
                "unsupported cache version {}",
                file.version
            )));
        }
        Ok(file.entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Disable reads for this run. Fresh results are still stored.
    pub fn disable_lookups(&mut self) {
        self.lookups_enabled = false;
    }

    /// The stored entry for `keyword`, expired or not. Always absent when
    /// lookups are disabled.
    pub fn get(&self, keyword: &str) -> Option<&CacheEntry> {
        if !self.lookups_enabled {
            return None;
        }
        self.entries.get(&normalize_keyword(keyword))
    }

    /// TTL in hours applied to entries of `rank`.
    pub fn ttl_hours(&self, rank: Rank) -> u64 {
        self.ttl.hours_for(rank, self.default_ttl_hours)
    }

    /// Whether `entry` must be re-fetched at `now`.
    pub fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let ttl = self.ttl_hours(entry.result.rank);
        if ttl == 0 {
            return true;
        }
        let ttl = i64::try_from(ttl)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(entry.stored_at) >= ttl
    }

    /// The entry for `keyword` if present and not expired at `now`.
    pub fn fresh(&self, keyword: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        self.get(keyword).filter(|entry| !self.is_expired(entry, now))
    }

    /// Store `result`, replacing any previous entry for the keyword. The
    /// analysis time of the result is used as the storage time. Flushes to
    /// disk once every `checkpoint_interval` stores.
    ///
    /// # Errors
    ///
    /// Returns an error if a checkpoint flush fails.
    pub fn put(&mut self, keyword: &str, result: RankedResult) -> Result<()> {
        let key = normalize_keyword(keyword);
        let entry = CacheEntry {
            keyword: key.clone(),
            stored_at: result.analyzed_at,
            result,
        };
        self.entries.insert(key, entry);
        self.dirty = true;
        self.since_checkpoint += 1;
        if self.since_checkpoint >= self.checkpoint_interval {
            tracing::info!(entries = self.entries.len(), "cache checkpoint");
            self.flush()?;
        }
        Ok(())
    }

    /// Write pending changes to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let content = serde_json::to_string_pretty(&CacheFileRef {
            version: CACHE_VERSION,
            entries: &self.entries,
        })
        .map_err(|e| MinerError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &content)?;
        self.dirty = false;
        self.since_checkpoint = 0;
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "cache flushed");
        Ok(())
    }

    /// Entry counts at `now`, overall and per rank.
    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.entries.values() {
            let counts = stats.by_rank.entry(entry.result.rank).or_default();
            if self.is_expired(entry, now) {
                counts.expired += 1;
                stats.expired += 1;
            } else {
                counts.fresh += 1;
                stats.fresh += 1;
            }
            stats.total += 1;
        }
        stats
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "cache flush on drop failed");
        }
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or(CACHE_FILE),
        std::process::id()
    );
    let tmp_path = path
        .parent()
        .map(|p| p.join(&tmp_name))
        .unwrap_or_else(|| PathBuf::from(&tmp_name));

    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::rank::RankReason;
    use crate::types::Route;
    use chrono::Duration;

    fn settings(dir: &Path) -> CacheSettings {
        CacheSettings {
            dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn result(keyword: &str, reason: RankReason, at: DateTime<Utc>) -> RankedResult {
        RankedResult {
            keyword: keyword.into(),
            rank: reason.rank(),
            reason,
            match_count: 12,
            route: Route::A,
            analyzed_at: at,
        }
    }

    #[test]
    fn ttl_table_defaults() {
        let table = TtlTable::default();
        assert_eq!(table.hours_for(Rank::SS, 24), 0);
        assert_eq!(table.hours_for(Rank::S, 24), 0);
        assert_eq!(table.hours_for(Rank::A, 24), 24);
        assert_eq!(table.hours_for(Rank::B, 24), 48);
        assert_eq!(table.hours_for(Rank::C, 24), 168);
    }

    #[test]
    fn disabled_table_uses_default_ttl() {
        let table = TtlTable {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(table.hours_for(Rank::S, 12), 12);
        assert_eq!(table.hours_for(Rank::C, 12), 12);
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(&settings(dir.path()), "love").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.path(), dir.path().join("love").join("keyword_cache.json"));
    }

    #[test]
    fn b_rank_entry_survives_until_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc::now();
        let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        store.put("k", result("k", RankReason::StaleBeyondB, t)).unwrap();

        let entry = store.get("k").unwrap().clone();
        assert!(!store.is_expired(&entry, t + Duration::hours(47)));
        assert!(store.is_expired(&entry, t + Duration::hours(48)));
        assert!(store.fresh("k", t + Duration::hours(47)).is_some());
        assert!(store.fresh("k", t + Duration::hours(48)).is_none());
    }

    #[test]
    fn c_rank_entry_survives_a_week() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc::now();
        let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        store.put("k", result("k", RankReason::Active, t)).unwrap();

        let entry = store.get("k").unwrap().clone();
        assert_eq!(entry.result.rank, Rank::C);
        assert!(!store.is_expired(&entry, t + Duration::hours(167)));
        assert!(store.is_expired(&entry, t + Duration::hours(168)));
        assert!(store.fresh("k", t + Duration::hours(167)).is_some());
        assert!(store.fresh("k", t + Duration::hours(168)).is_none());
    }

    #[test]
    fn zero_ttl_is_always_expired() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc::now();
        let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        store.put("k", result("k", RankReason::NoCompetitors, t)).unwrap();

        let entry = store.get("k").unwrap().clone();
        assert_eq!(entry.result.rank, Rank::S);
        assert!(store.is_expired(&entry, t));
        assert!(store.fresh("k", t).is_none());
    }

    #[test]
    fn put_overwrites_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc::now();
        let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        store.put("Foo  Bar", result("Foo  Bar", RankReason::Active, t)).unwrap();
        store
            .put("foo bar", result("foo bar", RankReason::StaleBeyondA, t))
            .unwrap();

        assert_eq!(store.len(), 1);
        let entry = store.get("FOO bar").unwrap();
        assert_eq!(entry.keyword, "foo bar");
        assert_eq!(entry.result.rank, Rank::A);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc::now();
        {
            let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
            store.put("k", result("k", RankReason::Active, t)).unwrap();
            store.flush().unwrap();
        }
        let store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        let entry = store.get("k").unwrap();
        assert_eq!(entry.result.rank, Rank::C);
        assert_eq!(entry.stored_at, t);
    }

    #[test]
    fn drop_flushes_dirty_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
            store
                .put("k", result("k", RankReason::Active, Utc::now()))
                .unwrap();
        }
        let store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn checkpoint_flushes_every_n_puts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = settings(dir.path());
        config.checkpoint_interval = 2;
        let mut store = CacheStore::open(&config, "p").unwrap();
        let path = store.path().to_path_buf();

        store.put("a", result("a", RankReason::Active, Utc::now())).unwrap();
        assert!(!path.exists());
        store.put("b", result("b", RankReason::Active, Utc::now())).unwrap();
        assert!(path.exists());

        let on_disk = CacheStore::load(&path).unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[test]
    fn corrupt_file_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = CacheStore::path_for(dir.path(), "p");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        assert!(store.is_empty());
        assert!(path.with_extension("json.corrupt").exists());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_that_cannot_be_moved_still_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = CacheStore::path_for(dir.path(), "p");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        // A non-empty directory at the backup path makes the rename fail.
        let backup = path.with_extension("json.corrupt");
        std::fs::create_dir_all(backup.join("occupied")).unwrap();

        let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        assert!(store.is_empty());
        assert!(path.exists());

        store
            .put("k", result("k", RankReason::Active, Utc::now()))
            .unwrap();
        store.flush().unwrap();
        assert_eq!(CacheStore::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn load_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyword_cache.json");
        std::fs::write(&path, r#"{"version": 99, "entries": {}}"#).unwrap();
        let err = CacheStore::load(&path).unwrap_err();
        assert!(matches!(err, MinerError::CacheCorruption(_)));
    }

    #[test]
    fn disabled_lookups_miss_but_still_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = settings(dir.path());
        config.enabled = false;
        let t = Utc::now();
        let mut store = CacheStore::open(&config, "p").unwrap();
        store.put("k", result("k", RankReason::Active, t)).unwrap();
        assert!(store.get("k").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stats_split_fresh_and_expired() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc::now();
        let mut store = CacheStore::open(&settings(dir.path()), "p").unwrap();
        store.put("a", result("a", RankReason::NoCompetitors, t)).unwrap();
        store.put("b", result("b", RankReason::Active, t)).unwrap();
        store.put("c", result("c", RankReason::Active, t - Duration::days(10))).unwrap();

        let stats = store.stats(t);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.expired, 2);
        assert_eq!(
            stats.by_rank[&Rank::C],
            RankCounts {
                fresh: 1,
                expired: 1
            }
        );
        assert_eq!(stats.by_rank[&Rank::S].expired, 1);
    }
}

//! Competition resolution: cache lookup, batched submission, polling with
//! backoff, classification and cache write-back.
//!
//! Fresh cache entries are reused with the route of the current candidate.
//! Misses are submitted in batches of `batch_size`; each batch is polled
//! until every keyword is reported, the poll deadline passes, or the run
//! is cancelled. A quota error stops all further lookups for the run and
//! leaves the remaining candidates unranked.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use miner_sources::{BatchHandle, CompetitionSignal, CompetitionSource, SourceError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::config::CompetitionSettings;
use crate::rank::{RankPolicy, WatchList};
use crate::types::{Candidate, ErrorKind, RankedResult, RunError, Stage};

/// What happened to a set of candidates.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Ranked results in resolution order.
    pub results: Vec<RankedResult>,
    /// Candidates that could not be ranked.
    pub unranked: Vec<Candidate>,
    /// One record per failed or skipped candidate.
    pub errors: Vec<RunError>,
    /// Results served from the cache.
    pub cache_hits: usize,
    /// Whether quota exhaustion stopped lookups.
    pub quota_exhausted: bool,
    /// Whether cancellation stopped lookups.
    pub cancelled: bool,
}

impl Resolution {
    fn abandon<I>(&mut self, candidates: I, kind: ErrorKind, message: &str)
    where
        I: IntoIterator<Item = Candidate>,
    {
        for candidate in candidates {
            self.errors.push(RunError::new(
                candidate.keyword.clone(),
                kind,
                Stage::Competition,
                message,
            ));
            self.unranked.push(candidate);
        }
    }
}

/// Resolves candidates against a competition source.
pub struct Resolver<'a, C> {
    source: &'a C,
    settings: &'a CompetitionSettings,
    policy: &'a RankPolicy,
    watch: &'a WatchList,
    cancel: &'a CancellationToken,
}

impl<'a, C: CompetitionSource> Resolver<'a, C> {
    pub fn new(
        source: &'a C,
        settings: &'a CompetitionSettings,
        policy: &'a RankPolicy,
        watch: &'a WatchList,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            source,
            settings,
            policy,
            watch,
            cancel,
        }
    }

    /// Rank every candidate, through the cache where possible.
    pub async fn resolve(&self, candidates: Vec<Candidate>, cache: &mut CacheStore) -> Resolution {
        let mut out = Resolution::default();
        let now = Utc::now();

        let mut misses = Vec::new();
        for candidate in candidates {
            match cache.fresh(&candidate.keyword, now) {
                Some(entry) => {
                    out.results.push(RankedResult {
                        keyword: candidate.keyword.clone(),
                        route: candidate.route,
                        ..entry.result.clone()
                    });
                    out.cache_hits += 1;
                }
                None => misses.push(candidate),
            }
        }
        tracing::info!(
            hits = out.cache_hits,
            misses = misses.len(),
            "cache consulted"
        );

        let batch_size = self.settings.batch_size.max(1);
        let mut rest = misses.into_iter();
        loop {
            let chunk: Vec<Candidate> = rest.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            if out.quota_exhausted {
                out.abandon(chunk, ErrorKind::QuotaExceeded, "competition quota exhausted earlier in run");
                continue;
            }
            if self.cancel.is_cancelled() {
                out.cancelled = true;
                out.abandon(chunk, ErrorKind::Cancelled, "run cancelled");
                continue;
            }
            self.resolve_batch(chunk, cache, &mut out).await;
        }

        tracing::info!(
            ranked = out.results.len(),
            unranked = out.unranked.len(),
            quota_exhausted = out.quota_exhausted,
            cancelled = out.cancelled,
            "competition resolution finished"
        );
        out
    }

    async fn resolve_batch(&self, chunk: Vec<Candidate>, cache: &mut CacheStore, out: &mut Resolution) {
        let keywords: Vec<String> = chunk.iter().map(|c| c.keyword.clone()).collect();
        let bound = self.settings.date_lower_bound(Utc::now());

        let handle = match self
            .with_retries(|| self.source.submit_batch(&keywords, bound))
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                self.fail(chunk, &err, out);
                return;
            }
        };
        tracing::info!(batch = %handle, "competition batch submitted");

        let mut remaining: HashMap<String, Candidate> =
            chunk.into_iter().map(|c| (c.key(), c)).collect();
        self.poll_until_done(&handle, &mut remaining, cache, out).await;
    }

    async fn poll_until_done(
        &self,
        handle: &BatchHandle,
        remaining: &mut HashMap<String, Candidate>,
        cache: &mut CacheStore,
        out: &mut Resolution,
    ) {
        let deadline = Instant::now() + self.settings.poll_timeout();
        let mut interval = self.settings.poll_interval();

        while !remaining.is_empty() {
            if self.cancel.is_cancelled() {
                out.cancelled = true;
                out.abandon(drain(remaining), ErrorKind::Cancelled, "run cancelled");
                return;
            }
            if Instant::now() >= deadline {
                tracing::warn!(batch = %handle, pending = remaining.len(), "batch poll timed out");
                out.abandon(
                    drain(remaining),
                    ErrorKind::PollTimeout,
                    "batch did not complete before the poll deadline",
                );
                return;
            }

            let poll = match self.with_retries(|| self.source.poll_results(handle)).await {
                Ok(poll) => poll,
                Err(err) => {
                    self.fail(drain(remaining), &err, out);
                    return;
                }
            };

            let before = remaining.len();
            let complete = poll.is_complete();
            for (keyword, signal) in poll.ready {
                match remaining.remove(&crate::word_group::normalize_keyword(&keyword)) {
                    Some(candidate) => self.rank(candidate, signal, cache, out),
                    None => tracing::debug!(%keyword, "ignoring result for unknown keyword"),
                }
            }

            let progressed = remaining.len() < before;

            if complete && !remaining.is_empty() {
                tracing::warn!(batch = %handle, missing = remaining.len(), "batch completed without some keywords");
                out.abandon(
                    drain(remaining),
                    ErrorKind::TransientFetch,
                    "keyword missing from completed batch",
                );
                return;
            }

            if progressed {
                interval = self.settings.poll_interval();
            } else if !remaining.is_empty() {
                let wait = interval.min(deadline.saturating_duration_since(Instant::now()));
                tracing::debug!(batch = %handle, wait_ms = wait.as_millis() as u64, "batch pending");
                self.sleep(wait).await;
                interval = (interval * 2).min(self.settings.max_poll_interval());
            }
        }
    }

    fn rank(&self, candidate: Candidate, signal: CompetitionSignal, cache: &mut CacheStore, out: &mut Resolution) {
        let signal = signal.capped(self.settings.max_match_count);
        let reason = self.policy.classify(&signal, self.watch);
        let result = RankedResult {
            keyword: candidate.keyword,
            rank: reason.rank(),
            reason,
            match_count: signal.match_count,
            route: candidate.route,
            analyzed_at: Utc::now(),
        };
        tracing::debug!(keyword = %result.keyword, rank = %result.rank, count = result.match_count, "keyword ranked");
        if let Err(e) = cache.put(&result.keyword, result.clone()) {
            tracing::warn!(error = %e, "cache checkpoint failed");
        }
        out.results.push(result);
    }

    fn fail<I>(&self, candidates: I, err: &SourceError, out: &mut Resolution)
    where
        I: IntoIterator<Item = Candidate>,
    {
        if err.is_quota() {
            tracing::error!(error = %err, "competition quota exhausted, stopping lookups");
            out.quota_exhausted = true;
            out.abandon(candidates, ErrorKind::QuotaExceeded, &err.to_string());
        } else if self.cancel.is_cancelled() {
            out.cancelled = true;
            out.abandon(candidates, ErrorKind::Cancelled, "run cancelled");
        } else {
            tracing::warn!(error = %err, "competition lookup failed");
            out.abandon(candidates, ErrorKind::TransientFetch, &err.to_string());
        }
    }

    /// Run `op` up to `max_attempts` times, backing off exponentially
    /// between retryable failures.
    async fn with_retries<T, F, Fut>(&self, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let attempts = self.settings.max_attempts.max(1);
        let mut backoff = self.settings.retry_backoff();
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts && !self.cancel.is_cancelled() => {
                    tracing::debug!(attempt, error = %err, "retrying competition call");
                    self.sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn sleep(&self, wait: Duration) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(wait) => {}
        }
    }
}

fn drain(remaining: &mut HashMap<String, Candidate>) -> Vec<Candidate> {
    remaining.drain().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::CacheSettings;
    use crate::rank::{Rank, RankReason};
    use crate::types::{Origin, Route};
    use chrono::{DateTime, Utc};
    use miner_sources::BatchPoll;
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted poll responses; keywords without a signal stay pending.
    #[derive(Default)]
    struct Scripted {
        signals: HashMap<String, CompetitionSignal>,
        polls: Mutex<VecDeque<Result<Vec<String>, SourceError>>>,
        submits: Mutex<Vec<Vec<String>>>,
        submit_errors: Mutex<VecDeque<SourceError>>,
        poll_count: AtomicUsize,
        bounds: Mutex<Vec<Option<DateTime<Utc>>>>,
    }

    impl Scripted {
        fn signal(mut self, keyword: &str, signal: CompetitionSignal) -> Self {
            self.signals.insert(keyword.into(), signal);
            self
        }

        /// Queue a poll step releasing `keywords`; an empty step is a
        /// no-progress poll. Without queued steps a poll releases
        /// everything known.
        fn step(self, keywords: &[&str]) -> Self {
            self.polls
                .lock()
                .unwrap()
                .push_back(Ok(keywords.iter().map(|k| (*k).to_string()).collect()));
            self
        }

        fn poll_error(self, err: SourceError) -> Self {
            self.polls.lock().unwrap().push_back(Err(err));
            self
        }

        fn submit_error(self, err: SourceError) -> Self {
            self.submit_errors.lock().unwrap().push_back(err);
            self
        }

        fn submitted(&self) -> Vec<Vec<String>> {
            self.submits.lock().unwrap().clone()
        }
    }

    impl CompetitionSource for Scripted {
        async fn submit_batch(
            &self,
            keywords: &[String],
            date_lower_bound: Option<DateTime<Utc>>,
        ) -> Result<BatchHandle, SourceError> {
            if let Some(err) = self.submit_errors.lock().unwrap().pop_front() {
                return Err(err);
            }
            let mut submits = self.submits.lock().unwrap();
            submits.push(keywords.to_vec());
            self.bounds.lock().unwrap().push(date_lower_bound);
            Ok(BatchHandle {
                id: submits.len() as u64,
                size: keywords.len(),
            })
        }

        async fn poll_results(&self, handle: &BatchHandle) -> Result<BatchPoll, SourceError> {
            self.poll_count.fetch_add(1, Ordering::SeqCst);
            let batch = self.submits.lock().unwrap()[handle.id as usize - 1].clone();
            let release = match self.polls.lock().unwrap().pop_front() {
                Some(Ok(keywords)) => keywords,
                Some(Err(err)) => return Err(err),
                None => batch.clone(),
            };
            let ready: Vec<_> = batch
                .iter()
                .filter(|k| release.contains(k))
                .filter_map(|k| self.signals.get(k).map(|s| (k.clone(), s.clone())))
                .collect();
            let pending = batch
                .iter()
                .filter(|k| !release.contains(k) && self.signals.contains_key(*k))
                .cloned()
                .collect();
            Ok(BatchPoll { ready, pending })
        }
    }

    fn signal(count: u64, age: Option<f64>) -> CompetitionSignal {
        CompetitionSignal {
            match_count: count,
            domains: BTreeSet::new(),
            most_recent_age_hours: age,
            newest_within_hours: None,
        }
    }

    fn candidate(keyword: &str, route: Route) -> Candidate {
        Candidate {
            keyword: keyword.into(),
            route,
            origin: Origin::Recursive { depth: 0 },
            groups: vec!["seeds".into()],
        }
    }

    fn settings() -> CompetitionSettings {
        CompetitionSettings {
            poll_interval_ms: 100,
            max_poll_interval_ms: 400,
            poll_timeout_secs: 5,
            retry_backoff_ms: 50,
            ..Default::default()
        }
    }

    fn cache(dir: &tempfile::TempDir) -> CacheStore {
        let settings = CacheSettings {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        CacheStore::open(&settings, "test").unwrap()
    }

    async fn run(
        source: &Scripted,
        settings: &CompetitionSettings,
        candidates: Vec<Candidate>,
        cache: &mut CacheStore,
    ) -> Resolution {
        let policy = RankPolicy::default();
        let watch = WatchList::default();
        let cancel = CancellationToken::new();
        Resolver::new(source, settings, &policy, &watch, &cancel)
            .resolve(candidates, cache)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn ranks_and_caches_every_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default()
            .signal("a", signal(0, None))
            .signal("b", signal(40, Some(800.0)));

        let out = run(
            &source,
            &settings(),
            vec![candidate("a", Route::A), candidate("b", Route::B)],
            &mut store,
        )
        .await;

        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].rank, Rank::S);
        assert_eq!(out.results[0].reason, RankReason::NoCompetitors);
        assert_eq!(out.results[1].rank, Rank::A);
        assert_eq!(out.results[1].route, Route::B);
        assert!(out.errors.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn splits_into_batches() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let mut source = Scripted::default();
        let mut candidates = Vec::new();
        for i in 0..5 {
            let kw = format!("k{i}");
            source = source.signal(&kw, signal(50, Some(10.0)));
            candidates.push(candidate(&kw, Route::A));
        }
        let settings = CompetitionSettings {
            batch_size: 2,
            ..settings()
        };

        let out = run(&source, &settings, candidates, &mut store).await;

        let sizes: Vec<_> = source.submitted().iter().map(Vec::len).collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert_eq!(out.results.len(), 5);
        assert!(out.results.iter().all(|r| r.rank == Rank::C));
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_entries_skip_lookup_and_take_current_route() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let cached = RankedResult {
            keyword: "a".into(),
            rank: Rank::C,
            reason: RankReason::Active,
            match_count: 9,
            route: Route::A,
            analyzed_at: Utc::now(),
        };
        store.put("a", cached).unwrap();
        let source = Scripted::default();

        let out = run(&source, &settings(), vec![candidate("a", Route::B)], &mut store).await;

        assert!(source.submitted().is_empty());
        assert_eq!(out.cache_hits, 1);
        assert_eq!(out.results[0].route, Route::B);
        assert_eq!(out.results[0].match_count, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_entries_are_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let cached = RankedResult {
            keyword: "a".into(),
            rank: Rank::S,
            reason: RankReason::NoCompetitors,
            match_count: 0,
            route: Route::A,
            analyzed_at: Utc::now(),
        };
        store.put("a", cached).unwrap();
        let source = Scripted::default().signal("a", signal(50, Some(10.0)));

        let out = run(&source, &settings(), vec![candidate("a", Route::A)], &mut store).await;

        assert_eq!(source.submitted().len(), 1);
        assert_eq!(out.results[0].rank, Rank::C);
        assert_eq!(store.get("a").unwrap().result.rank, Rank::C);
    }

    #[tokio::test(start_paused = true)]
    async fn backs_off_while_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default()
            .signal("a", signal(1, Some(10.0)))
            .signal("b", signal(1, Some(10.0)))
            .step(&[])
            .step(&[])
            .step(&["a"])
            .step(&["b"]);
        let start = Instant::now();

        let out = run(
            &source,
            &settings(),
            vec![candidate("a", Route::A), candidate("b", Route::A)],
            &mut store,
        )
        .await;

        assert_eq!(out.results.len(), 2);
        assert_eq!(source.poll_count.load(Ordering::SeqCst), 4);
        // 100ms then 200ms of backoff; progress polls re-poll immediately.
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_millis(700));
    }

    /// Keeps reporting a keyword that was never submitted.
    #[derive(Default)]
    struct Stray {
        polls: AtomicUsize,
    }

    impl CompetitionSource for Stray {
        async fn submit_batch(
            &self,
            keywords: &[String],
            _date_lower_bound: Option<DateTime<Utc>>,
        ) -> Result<BatchHandle, SourceError> {
            Ok(BatchHandle {
                id: 1,
                size: keywords.len(),
            })
        }

        async fn poll_results(&self, _handle: &BatchHandle) -> Result<BatchPoll, SourceError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(BatchPoll {
                ready: vec![("somebody else".into(), signal(1, Some(10.0)))],
                pending: vec!["a".into()],
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_keywords_do_not_count_as_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Stray::default();
        let settings = CompetitionSettings {
            poll_timeout_secs: 2,
            ..settings()
        };
        let policy = RankPolicy::default();
        let watch = WatchList::default();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let out = Resolver::new(&source, &settings, &policy, &watch, &cancel)
            .resolve(vec![candidate("a", Route::A)], &mut store)
            .await;

        // 100, 200, 400, 400, ... ms of backoff until the 2s deadline.
        assert!(source.polls.load(Ordering::SeqCst) <= 10);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(out.unranked.len(), 1);
        assert_eq!(out.errors[0].kind, ErrorKind::PollTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_timeout_leaves_keywords_unranked() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let mut source = Scripted::default().signal("a", signal(1, Some(10.0)));
        for _ in 0..200 {
            source = source.step(&[]);
        }
        let settings = CompetitionSettings {
            poll_timeout_secs: 2,
            ..settings()
        };

        let out = run(&source, &settings, vec![candidate("a", Route::A)], &mut store).await;

        assert!(out.results.is_empty());
        assert_eq!(out.unranked.len(), 1);
        assert_eq!(out.errors[0].kind, ErrorKind::PollTimeout);
        assert_eq!(out.errors[0].stage, Stage::Competition);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default()
            .signal("a", signal(3, Some(10.0)))
            .poll_error(SourceError::Transient("503".into()))
            .poll_error(SourceError::Transient("503".into()));

        let out = run(&source, &settings(), vec![candidate("a", Route::A)], &mut store).await;

        assert_eq!(out.results.len(), 1);
        assert_eq!(source.poll_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fail_only_that_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default()
            .signal("a", signal(3, Some(10.0)))
            .signal("b", signal(3, Some(10.0)))
            .submit_error(SourceError::Transient("reset".into()))
            .submit_error(SourceError::Transient("reset".into()))
            .submit_error(SourceError::Transient("reset".into()));
        let settings = CompetitionSettings {
            batch_size: 1,
            ..settings()
        };

        let out = run(
            &source,
            &settings,
            vec![candidate("a", Route::A), candidate("b", Route::A)],
            &mut store,
        )
        .await;

        assert_eq!(out.unranked.len(), 1);
        assert_eq!(out.unranked[0].keyword, "a");
        assert_eq!(out.errors[0].kind, ErrorKind::TransientFetch);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].keyword, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn quota_stops_all_further_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default()
            .signal("a", signal(3, Some(10.0)))
            .signal("b", signal(3, Some(10.0)))
            .signal("c", signal(3, Some(10.0)))
            .submit_error(SourceError::QuotaExceeded("daily limit".into()));
        let settings = CompetitionSettings {
            batch_size: 1,
            ..settings()
        };

        let out = run(
            &source,
            &settings,
            vec![
                candidate("a", Route::A),
                candidate("b", Route::A),
                candidate("c", Route::A),
            ],
            &mut store,
        )
        .await;

        assert!(out.quota_exhausted);
        assert!(out.results.is_empty());
        assert_eq!(out.unranked.len(), 3);
        assert!(out.errors.iter().all(|e| e.kind == ErrorKind::QuotaExceeded));
        assert!(source.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quota_mid_batch_keeps_completed_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default()
            .signal("a", signal(3, Some(10.0)))
            .signal("b", signal(3, Some(10.0)))
            .step(&["a"])
            .poll_error(SourceError::QuotaExceeded("daily limit".into()));

        let out = run(
            &source,
            &settings(),
            vec![candidate("a", Route::A), candidate("b", Route::A)],
            &mut store,
        )
        .await;

        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].keyword, "a");
        assert_eq!(out.unranked[0].keyword, "b");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn crowded_keywords_rank_c_under_match_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default()
            .signal("crowded", signal(2_000, None))
            .signal("quiet", signal(40, None));
        let policy = RankPolicy {
            max_match_results: 1_000,
            ..Default::default()
        };
        let watch = WatchList::default();
        let cancel = CancellationToken::new();

        let out = Resolver::new(&source, &settings(), &policy, &watch, &cancel)
            .resolve(
                vec![candidate("crowded", Route::A), candidate("quiet", Route::A)],
                &mut store,
            )
            .await;

        assert_eq!(out.results[0].reason, RankReason::TooManyMatches);
        assert_eq!(out.results[0].rank, Rank::C);
        assert_eq!(out.results[1].rank, Rank::S);
    }

    #[tokio::test(start_paused = true)]
    async fn match_count_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default().signal("a", signal(5_000, Some(10.0)));
        let settings = CompetitionSettings {
            max_match_count: 1000,
            ..settings()
        };

        let out = run(&source, &settings, vec![candidate("a", Route::A)], &mut store).await;

        assert_eq!(out.results[0].match_count, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn date_lower_bound_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default().signal("a", signal(1, Some(10.0)));
        let settings = CompetitionSettings {
            date_lower_bound_days: Some(365),
            ..settings()
        };

        run(&source, &settings, vec![candidate("a", Route::A)], &mut store).await;

        let bounds = source.bounds.lock().unwrap().clone();
        assert_eq!(bounds.len(), 1);
        assert!(bounds[0].is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_lookup_marks_candidates_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = cache(&dir);
        let source = Scripted::default().signal("a", signal(1, Some(10.0)));
        let settings = settings();
        let policy = RankPolicy::default();
        let watch = WatchList::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let out = Resolver::new(&source, &settings, &policy, &watch, &cancel)
            .resolve(vec![candidate("a", Route::A)], &mut store)
            .await;

        assert!(out.cancelled);
        assert_eq!(out.errors[0].kind, ErrorKind::Cancelled);
        assert!(source.submitted().is_empty());
    }
}

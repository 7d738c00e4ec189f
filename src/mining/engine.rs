//! The mining engine: runs every route of a plan, unions the candidates and
//! ranks them through the cache.

use miner_sources::{CompetitionSource, SuggestionSource, TrendSource};
use tokio_util::sync::CancellationToken;

use super::resolver::Resolver;
use super::{CandidateSet, MiningPlan, Pacer, RouteSpec, mine_combinatorial, mine_recursive};
use crate::cache::CacheStore;
use crate::config::MinerConfig;
use crate::types::{Candidate, ErrorKind, RankedResult, RunError, RunSummary, Stage};

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Ranked results in resolution order.
    pub results: Vec<RankedResult>,
    /// Candidates left without a rank, each with a matching error record.
    pub unranked: Vec<Candidate>,
}

/// Drives the three upstream sources for one run at a time.
pub struct MiningEngine<S, T, C> {
    suggest: S,
    trends: T,
    competition: C,
    config: MinerConfig,
    cancel: CancellationToken,
}

impl<S, T, C> MiningEngine<S, T, C>
where
    S: SuggestionSource,
    T: TrendSource,
    C: CompetitionSource,
{
    pub fn new(suggest: S, trends: T, competition: C, config: MinerConfig) -> Self {
        Self {
            suggest,
            trends,
            competition,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the run between lookups.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Run `plan` to completion or cancellation.
    ///
    /// Upstream failures never abort the run; they are recorded in the
    /// summary. The cache is flushed before returning on every path.
    pub async fn run(&self, plan: &MiningPlan, cache: &mut CacheStore) -> RunReport {
        tracing::info!(routes = plan.routes.len(), "mining run started");
        let pacer = Pacer::new(self.config.rate_limit.wait());
        let mut errors: Vec<RunError> = Vec::new();
        let mut cancelled = false;

        let trends = if plan.routes.iter().any(RouteSpec::uses_trends) {
            self.fetch_trends(&plan.locale, &mut errors).await
        } else {
            Vec::new()
        };

        let mut candidates = CandidateSet::new();
        for route in &plan.routes {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let expansion = match route {
                RouteSpec::Recursive { root, filter } => {
                    mine_recursive(
                        &self.suggest,
                        root,
                        filter,
                        self.config.mining.max_recursion_depth,
                        &pacer,
                        &self.cancel,
                    )
                    .await
                }
                RouteSpec::Combinatorial { groups, use_trend } => {
                    let trends: &[String] = if *use_trend { &trends } else { &[] };
                    mine_combinatorial(&self.suggest, trends, groups, &pacer, &self.cancel).await
                }
            };
            errors.extend(expansion.errors);
            let added = candidates.extend(expansion.candidates);
            tracing::info!(added, total = candidates.len(), "candidates merged");
            if expansion.cancelled {
                cancelled = true;
                break;
            }
        }

        let resolver = Resolver::new(
            &self.competition,
            &self.config.competition,
            &plan.policy,
            &plan.watch,
            &self.cancel,
        );
        let resolution = resolver.resolve(candidates.into_vec(), cache).await;
        errors.extend(resolution.errors);
        cancelled |= resolution.cancelled;

        if let Err(e) = cache.flush() {
            tracing::error!(error = %e, path = %cache.path().display(), "cache flush failed");
        }

        let summary = RunSummary {
            completed: !cancelled,
            result_count: resolution.results.len(),
            errors_encountered: errors,
        };
        tracing::info!(
            completed = summary.completed,
            results = summary.result_count,
            unranked = resolution.unranked.len(),
            cache_hits = resolution.cache_hits,
            errors = summary.errors_encountered.len(),
            "mining run finished"
        );
        RunReport {
            summary,
            results: resolution.results,
            unranked: resolution.unranked,
        }
    }

    async fn fetch_trends(&self, locale: &str, errors: &mut Vec<RunError>) -> Vec<String> {
        if self.cancel.is_cancelled() {
            return Vec::new();
        }
        match self.trends.fetch_rising_terms(locale).await {
            Ok(terms) => {
                tracing::info!(locale, count = terms.len(), "rising terms fetched");
                terms
            }
            Err(err) => {
                tracing::warn!(locale, error = %err, "trend lookup failed, combining word groups only");
                errors.push(RunError::new(
                    locale,
                    ErrorKind::from(&err),
                    Stage::Trend,
                    err.to_string(),
                ));
                Vec::new()
            }
        }
    }
}

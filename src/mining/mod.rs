//! Mining engine: suggestion expansion, candidate dedup, competition
//! resolution and ranking.
//!
//! - [`recursive`]: Route A, filter-guided recursive expansion
//! - [`combinatorial`]: Route B, cross-product expansion
//! - [`dedup`]: run-wide candidate set keyed by normalized keyword
//! - [`resolver`]: cached, batched competition lookups and classification
//! - [`engine`]: drives a [`MiningPlan`] end to end

pub mod combinatorial;
pub mod dedup;
pub mod engine;
pub mod recursive;
pub mod resolver;

use std::collections::HashSet;
use std::time::Duration;

use miner_sources::SourceConfig;
use tokio_util::sync::CancellationToken;

use crate::rank::{RankPolicy, WatchList};
use crate::types::{Candidate, RunError};
use crate::word_group::{WordGroup, normalize_keyword};

pub use combinatorial::mine_combinatorial;
pub use dedup::CandidateSet;
pub use engine::{MiningEngine, RunReport};
pub use recursive::mine_recursive;

/// One expansion step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSpec {
    /// Route A: expand `root`, recursing only into suggestions that contain
    /// a `filter` term.
    Recursive { root: WordGroup, filter: WordGroup },
    /// Route B: suggestions for every combination of the groups, prefixed
    /// by the rising trend terms when `use_trend` is set.
    Combinatorial {
        groups: Vec<WordGroup>,
        use_trend: bool,
    },
}

impl RouteSpec {
    pub fn uses_trends(&self) -> bool {
        matches!(self, Self::Combinatorial { use_trend: true, .. })
    }
}

/// Everything the engine needs for one run.
#[derive(Debug, Clone, Default)]
pub struct MiningPlan {
    /// Expansion steps, run in order; their candidates are unioned.
    pub routes: Vec<RouteSpec>,
    /// Competitor domains watched by the SS rule.
    pub watch: WatchList,
    /// Classifier thresholds.
    pub policy: RankPolicy,
    /// Geo code passed to the trend source.
    pub locale: String,
}

impl MiningPlan {
    /// Align a windowed competition source with this plan's thresholds:
    /// probe windows on every rank boundary and the title-match limit.
    pub fn tune_sources(&self, sources: &mut SourceConfig) {
        sources.freshness_windows_days = self.policy.probe_windows_days();
        sources.max_title_matches = self.policy.max_match_results;
    }
}

/// Output of one expansion route.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Candidates in discovery order, unique within the route.
    pub candidates: Vec<Candidate>,
    /// Failed lookups, degraded to empty suggestion lists.
    pub errors: Vec<RunError>,
    /// Number of suggestion lookups issued.
    pub lookups: usize,
    /// Whether the walk stopped early on cancellation.
    pub cancelled: bool,
}

/// Clean one suggestion response: drop blanks, the echoed `query` and
/// repeats within the response, keeping upstream order.
pub(crate) fn distinct_suggestions(query: &str, suggestions: Vec<String>) -> Vec<(String, String)> {
    let query_key = normalize_keyword(query);
    let mut seen = HashSet::new();
    suggestions
        .into_iter()
        .filter_map(|s| {
            let key = normalize_keyword(&s);
            (!key.is_empty() && key != query_key && seen.insert(key.clone())).then_some((s, key))
        })
        .collect()
}

/// Fixed delay before each upstream suggestion call.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    wait: Duration,
}

impl Pacer {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }

    /// Sleep for the configured delay. Returns `false` if `cancel` fired
    /// first.
    pub async fn pause(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        if self.wait.is_zero() {
            return true;
        }
        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(self.wait) => true,
        }
    }
}

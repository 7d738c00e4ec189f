//! Core types exchanged between the adapters and the mining engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Competitive pressure and freshness observed for one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionSignal {
    /// Number of indexed documents whose title contains the keyword
    /// (`allintitle:` count).
    pub match_count: u64,
    /// Hostnames appearing in the freshest top results.
    pub domains: BTreeSet<String>,
    /// Age in hours of the most recent matching document, or a lower bound
    /// on it when the source only observed a date window. `None` when no
    /// qualifying document exists inside any probed window.
    pub most_recent_age_hours: Option<f64>,
    /// Upper bound on that age when it is only known to lie inside a date
    /// window. `None` when `most_recent_age_hours` is exact.
    #[serde(default)]
    pub newest_within_hours: Option<f64>,
}

impl CompetitionSignal {
    /// A signal with no competing documents at all.
    pub fn empty() -> Self {
        Self {
            match_count: 0,
            domains: BTreeSet::new(),
            most_recent_age_hours: None,
            newest_within_hours: None,
        }
    }

    /// Largest age the most recent document can have.
    pub fn age_upper_bound_hours(&self) -> Option<f64> {
        self.newest_within_hours.or(self.most_recent_age_hours)
    }

    /// Clamp `match_count` to `max`. A `max` of 0 leaves the count untouched.
    #[must_use]
    pub fn capped(mut self, max: u64) -> Self {
        if max > 0 && self.match_count > max {
            self.match_count = max;
        }
        self
    }

    /// Whether any qualifying document was found.
    pub fn has_recent_document(&self) -> bool {
        self.most_recent_age_hours.is_some()
    }
}

/// Opaque reference to a submitted competition batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchHandle {
    /// Adapter-assigned batch id.
    pub id: u64,
    /// Number of keywords submitted in the batch.
    pub size: usize,
}

impl fmt::Display for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{} ({} keywords)", self.id, self.size)
    }
}

/// Outcome of one poll against a submitted batch.
#[derive(Debug, Clone, Default)]
pub struct BatchPoll {
    /// Keywords that completed since the previous poll, in completion order.
    pub ready: Vec<(String, CompetitionSignal)>,
    /// Keywords still being analysed.
    pub pending: Vec<String>,
}

impl BatchPoll {
    /// Whether the batch has no outstanding keywords.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

//! Five-tier rank classifier.
//!
//! A rank is a pure function of a [`CompetitionSignal`], the watched-domain
//! list and a [`RankPolicy`]. Rules are evaluated top-down and the first
//! guard that holds decides; the S/A/B age thresholds overlap, so order is
//! significant.
//!
//! | order | reason                 | rank | guard                                        |
//! |-------|------------------------|------|----------------------------------------------|
//! | 1     | `TooManyMatches`       | C    | matches above `max_match_results` (if set)   |
//! | 2     | `Sniper`               | SS   | 1..=5 matches, all hosts watched, age ≤ 24h  |
//! | 3     | `NoCompetitors`        | S    | 0 matches                                    |
//! | 4     | `NoQualifyingDocument` | S    | no dated document in any window              |
//! | 5     | `StaleBeyondS`         | S    | age ≥ 90 days                                |
//! | 6     | `StaleBeyondA`         | A    | age ≥ 30 days                                |
//! | 7     | `StaleBeyondB`         | B    | age ≥ 7 days                                 |
//! | -     | `Active`               | C    | otherwise                                    |
//!
//! When a source only knows the window the newest document falls in, the
//! SS rule tests the window's upper edge and the staleness rules test its
//! lower edge.

use std::collections::BTreeSet;
use std::fmt;

use miner_sources::CompetitionSignal;
use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};

/// Keyword rank, best first.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Few competitors, all of them watched sites, posting within a day.
    SS,
    /// No competition or long-abandoned topic.
    S,
    A,
    B,
    /// Actively contested; not worth entering.
    C,
}

impl Rank {
    /// Every rank, best first.
    pub fn all() -> &'static [Rank] {
        &[Self::SS, Self::S, Self::A, Self::B, Self::C]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SS => "SS",
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The classifier rule that produced a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankReason {
    TooManyMatches,
    Sniper,
    NoCompetitors,
    NoQualifyingDocument,
    StaleBeyondS,
    StaleBeyondA,
    StaleBeyondB,
    Active,
}

impl RankReason {
    pub fn rank(self) -> Rank {
        match self {
            Self::Sniper => Rank::SS,
            Self::NoCompetitors | Self::NoQualifyingDocument | Self::StaleBeyondS => Rank::S,
            Self::StaleBeyondA => Rank::A,
            Self::StaleBeyondB => Rank::B,
            Self::TooManyMatches | Self::Active => Rank::C,
        }
    }
}

/// Watched competitor domains.
///
/// A hostname is covered when it equals a watched domain or is one of its
/// subdomains, case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchList {
    domains: BTreeSet<String>,
}

impl WatchList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_end_matches('.').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Whether `host` belongs to a watched domain.
    pub fn covers(&self, host: &str) -> bool {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Whether every host is watched. An empty host set is never covered.
    pub fn covers_all<'a, I>(&self, hosts: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut any = false;
        for host in hosts {
            if !self.covers(host) {
                return false;
            }
            any = true;
        }
        any
    }
}

/// Thresholds used by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankPolicy {
    /// Whether the SS rule is evaluated at all.
    pub sniper_enabled: bool,
    /// Largest match count that still qualifies for SS.
    pub sniper_max_competitors: u64,
    /// Freshness window for SS, in hours.
    pub sniper_hours: f64,
    /// Staleness for S, in days.
    pub rank_s_days: u32,
    /// Staleness for A, in days.
    pub rank_a_days: u32,
    /// Staleness for B, in days.
    pub rank_b_days: u32,
    /// Match counts above this are C without looking at freshness. 0 = off.
    pub max_match_results: u64,
}

impl Default for RankPolicy {
    fn default() -> Self {
        Self {
            sniper_enabled: true,
            sniper_max_competitors: 5,
            sniper_hours: 24.0,
            rank_s_days: 90,
            rank_a_days: 30,
            rank_b_days: 7,
            max_match_results: 0,
        }
    }
}

type Guard = fn(&RankPolicy, &CompetitionSignal, &WatchList) -> bool;

/// Guarded rules, evaluated in order.
const RULES: &[(RankReason, Guard)] = &[
    (RankReason::TooManyMatches, too_many_matches),
    (RankReason::Sniper, sniper),
    (RankReason::NoCompetitors, no_competitors),
    (RankReason::NoQualifyingDocument, no_qualifying_document),
    (RankReason::StaleBeyondS, stale_beyond_s),
    (RankReason::StaleBeyondA, stale_beyond_a),
    (RankReason::StaleBeyondB, stale_beyond_b),
];

fn too_many_matches(policy: &RankPolicy, signal: &CompetitionSignal, _: &WatchList) -> bool {
    policy.max_match_results > 0 && signal.match_count > policy.max_match_results
}

fn sniper(policy: &RankPolicy, signal: &CompetitionSignal, watch: &WatchList) -> bool {
    policy.sniper_enabled
        && (1..=policy.sniper_max_competitors).contains(&signal.match_count)
        && signal
            .age_upper_bound_hours()
            .is_some_and(|age| age <= policy.sniper_hours)
        && watch.covers_all(&signal.domains)
}

fn no_competitors(_: &RankPolicy, signal: &CompetitionSignal, _: &WatchList) -> bool {
    signal.match_count == 0
}

fn no_qualifying_document(_: &RankPolicy, signal: &CompetitionSignal, _: &WatchList) -> bool {
    signal.most_recent_age_hours.is_none()
}

fn age_at_least(signal: &CompetitionSignal, days: u32) -> bool {
    signal
        .most_recent_age_hours
        .is_some_and(|age| age >= f64::from(days) * 24.0)
}

fn stale_beyond_s(policy: &RankPolicy, signal: &CompetitionSignal, _: &WatchList) -> bool {
    age_at_least(signal, policy.rank_s_days)
}

fn stale_beyond_a(policy: &RankPolicy, signal: &CompetitionSignal, _: &WatchList) -> bool {
    age_at_least(signal, policy.rank_a_days)
}

fn stale_beyond_b(policy: &RankPolicy, signal: &CompetitionSignal, _: &WatchList) -> bool {
    age_at_least(signal, policy.rank_b_days)
}

impl RankPolicy {
    /// Check thresholds are positive and ordered S ≥ A ≥ B.
    pub fn validate(&self) -> Result<()> {
        if self.rank_s_days == 0 || self.rank_a_days == 0 || self.rank_b_days == 0 {
            return Err(MinerError::Config(
                "ranking thresholds must be positive day counts".into(),
            ));
        }
        if !(self.rank_s_days >= self.rank_a_days && self.rank_a_days >= self.rank_b_days) {
            return Err(MinerError::Config(
                "ranking thresholds must satisfy rank_s_days >= rank_a_days >= rank_b_days".into(),
            ));
        }
        if !self.sniper_hours.is_finite() || self.sniper_hours < 0.0 {
            return Err(MinerError::Config(
                "sniper_hours must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    /// Date windows, in days and ascending, that a windowed competition
    /// source must probe so every threshold falls on a window edge: the
    /// sniper window (whole days within `sniper_hours`, at least one) when
    /// SS is enabled, then B, A and S.
    pub fn probe_windows_days(&self) -> Vec<u32> {
        let mut days = vec![self.rank_b_days, self.rank_a_days, self.rank_s_days];
        if self.sniper_enabled {
            // Saturating cast; at least one day.
            days.push(((self.sniper_hours / 24.0).floor() as u32).max(1));
        }
        days.retain(|d| *d > 0);
        days.sort_unstable();
        days.dedup();
        days
    }

    /// Classify a signal, reporting which rule fired.
    pub fn classify(&self, signal: &CompetitionSignal, watch: &WatchList) -> RankReason {
        RULES
            .iter()
            .find(|(_, guard)| guard(self, signal, watch))
            .map_or(RankReason::Active, |(reason, _)| *reason)
    }
}

/// Classify with the default thresholds.
pub fn classify(signal: &CompetitionSignal, watch: &WatchList) -> Rank {
    RankPolicy::default().classify(signal, watch).rank()
}

//! Core records flowing through a mining run.

use chrono::{DateTime, Utc};
use miner_sources::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rank::{Rank, RankReason};
use crate::word_group::normalize_keyword;

/// Which expansion strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// Recursive, filter-pruned suggestion expansion.
    A,
    /// Exhaustive cross-product suggestion expansion.
    B,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "A",
            Self::B => "B",
        })
    }
}

/// Route-specific provenance of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Route A: depth of the query whose suggestions contained the keyword.
    Recursive { depth: u32 },
    /// Route B: the combination that was sent to the suggestion source.
    Combinatorial { tuple: Vec<String> },
}

/// A keyword found by mining, with the provenance of its first sighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Keyword text as returned by the suggestion source.
    pub keyword: String,
    /// Route that produced it.
    pub route: Route,
    /// Depth or generating tuple.
    pub origin: Origin,
    /// Names of the word groups that produced it.
    pub groups: Vec<String>,
}

impl Candidate {
    /// Normalized keyword used for deduplication and cache lookups.
    pub fn key(&self) -> String {
        normalize_keyword(&self.keyword)
    }

    /// Recursion depth, for Route A candidates.
    pub fn depth(&self) -> Option<u32> {
        match self.origin {
            Origin::Recursive { depth } => Some(depth),
            Origin::Combinatorial { .. } => None,
        }
    }
}

/// Final ranking of one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Keyword text.
    pub keyword: String,
    /// Assigned rank.
    pub rank: Rank,
    /// Which classifier rule fired.
    pub reason: RankReason,
    /// Title-match document count (capped).
    pub match_count: u64,
    /// Route of the candidate this result was produced for.
    pub route: Route,
    /// When the competition signal was analysed.
    pub analyzed_at: DateTime<Utc>,
}

/// Pipeline stage an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Suggest,
    Trend,
    Competition,
}

/// Classification of a per-item failure recorded in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network/HTTP failure after bounded retries.
    TransientFetch,
    /// Service quota exhausted; no further competition lookups this run.
    QuotaExceeded,
    /// The batch did not finish before the poll deadline.
    PollTimeout,
    /// Left unresolved because the run was aborted.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TransientFetch => "transient_fetch",
            Self::QuotaExceeded => "quota_exceeded",
            Self::PollTimeout => "poll_timeout",
            Self::Cancelled => "cancelled",
        })
    }
}

impl From<&SourceError> for ErrorKind {
    fn from(err: &SourceError) -> Self {
        if err.is_quota() {
            Self::QuotaExceeded
        } else {
            Self::TransientFetch
        }
    }
}

/// One failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    /// Query or keyword the failure belongs to.
    pub keyword: String,
    pub kind: ErrorKind,
    pub stage: Stage,
    /// Human-readable detail.
    pub message: String,
}

impl RunError {
    pub fn new(keyword: impl Into<String>, kind: ErrorKind, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            kind,
            stage,
            message: message.into(),
        }
    }
}

/// Outcome summary of a mining run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// `false` when the run was aborted before every candidate was handled.
    pub completed: bool,
    /// Number of ranked results produced.
    pub result_count: usize,
    /// Every isolated failure, in the order encountered.
    pub errors_encountered: Vec<RunError>,
}

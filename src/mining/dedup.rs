//! Run-wide candidate deduplication.
//!
//! Candidates are keyed by normalized keyword. The first sighting keeps its
//! provenance; later sightings from either route are dropped.

use std::collections::HashSet;

use crate::types::Candidate;

/// Ordered, deduplicated candidates.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    seen: HashSet<String>,
    items: Vec<Candidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate. Returns `false` if its keyword was already present
    /// or normalizes to nothing.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        let key = candidate.key();
        if key.is_empty() || !self.seen.insert(key) {
            return false;
        }
        self.items.push(candidate);
        true
    }

    /// Add every candidate, returning how many were new.
    pub fn extend<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = Candidate>,
    {
        candidates
            .into_iter()
            .map(|c| self.insert(c))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.seen
            .contains(&crate::word_group::normalize_keyword(keyword))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Candidates in first-seen order.
    pub fn as_slice(&self) -> &[Candidate] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.items
    }
}

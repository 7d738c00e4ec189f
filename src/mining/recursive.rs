//! Route A: filter-guided recursive suggestion expansion.
//!
//! An explicit worklist seeded with every root term at depth 0. Every
//! suggestion becomes a candidate; only suggestions containing a filter
//! term are expanded further, and only while `depth + 1 < max_depth`.
//! A visited-set of normalized queries guarantees each query is issued at
//! most once, so cyclic suggestion graphs terminate.

use std::collections::{HashSet, VecDeque};

use miner_sources::SuggestionSource;
use tokio_util::sync::CancellationToken;

use super::{Expansion, Pacer, distinct_suggestions};
use crate::types::{Candidate, ErrorKind, Origin, Route, RunError, Stage};
use crate::word_group::{WordGroup, normalize_keyword};

/// Expand `root` recursively through `source`.
///
/// Failed lookups are recorded and treated as empty. A `max_depth` of 0
/// or 1 issues only the depth-0 queries.
pub async fn mine_recursive<S: SuggestionSource>(
    source: &S,
    root: &WordGroup,
    filter: &WordGroup,
    max_depth: u32,
    pacer: &Pacer,
    cancel: &CancellationToken,
) -> Expansion {
    let mut out = Expansion::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();

    for term in root.terms() {
        if visited.insert(normalize_keyword(term)) {
            queue.push_back((term.clone(), 0));
        }
    }

    tracing::info!(
        root = root.name(),
        filter = filter.name(),
        seeds = queue.len(),
        max_depth,
        "route A started"
    );

    while let Some((query, depth)) = queue.pop_front() {
        if !pacer.pause(cancel).await {
            out.cancelled = true;
            break;
        }

        out.lookups += 1;
        let suggestions = match source.fetch_suggestions(&query).await {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(depth, error = %err, "suggestion lookup failed, treating as empty");
                out.errors.push(RunError::new(
                    query.clone(),
                    ErrorKind::from(&err),
                    Stage::Suggest,
                    err.to_string(),
                ));
                Vec::new()
            }
        };
        tracing::debug!(%query, depth, count = suggestions.len(), "suggestions fetched");

        let groups = if depth == 0 {
            vec![root.name().to_owned()]
        } else {
            vec![root.name().to_owned(), filter.name().to_owned()]
        };

        for (suggestion, key) in distinct_suggestions(&query, suggestions) {
            let promising = depth + 1 < max_depth && filter.matches_within(&suggestion);
            if promising && visited.insert(key.clone()) {
                queue.push_back((suggestion.clone(), depth + 1));
            }
            if emitted.insert(key) {
                out.candidates.push(Candidate {
                    keyword: suggestion,
                    route: Route::A,
                    origin: Origin::Recursive { depth },
                    groups: groups.clone(),
                });
            }
        }
    }

    tracing::info!(
        candidates = out.candidates.len(),
        lookups = out.lookups,
        errors = out.errors.len(),
        cancelled = out.cancelled,
        "route A finished"
    );
    out
}

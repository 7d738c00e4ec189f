//! Route B: exhaustive cross-product expansion.
//!
//! Each combination of one rising trend term (when available) and one term
//! from every configured word group is joined with single spaces and sent
//! to the suggestion source once. No filtering and no recursion.

use std::collections::HashSet;

use miner_sources::SuggestionSource;
use tokio_util::sync::CancellationToken;

use super::{Expansion, Pacer, distinct_suggestions};
use crate::types::{Candidate, ErrorKind, Origin, Route, RunError, Stage};
use crate::word_group::WordGroup;

/// Provenance name of the trend axis.
pub const TREND_GROUP: &str = "trends";

/// One generated query and the terms it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    pub query: String,
    pub tuple: Vec<String>,
}

/// The named axes of the product: trends first (if any), then every
/// non-empty group in configured order.
fn axes<'a>(trends: &'a [String], groups: &'a [WordGroup]) -> Vec<(&'a str, &'a [String])> {
    let mut axes = Vec::with_capacity(groups.len() + 1);
    if !trends.is_empty() {
        axes.push((TREND_GROUP, trends));
    }
    for group in groups {
        if group.is_empty() {
            tracing::warn!(group = group.name(), "empty word group skipped");
            continue;
        }
        axes.push((group.name(), group.terms()));
    }
    axes
}

/// Every combination in lexicographic order over the axes. Empty when
/// there are no non-empty axes.
pub fn combinations(trends: &[String], groups: &[WordGroup]) -> Vec<Combination> {
    product(&axes(trends, groups))
}

fn product(axes: &[(&str, &[String])]) -> Vec<Combination> {
    if axes.is_empty() {
        return Vec::new();
    }

    let total = axes
        .iter()
        .try_fold(1usize, |acc, (_, terms)| acc.checked_mul(terms.len()))
        .unwrap_or(usize::MAX);
    let mut out = Vec::with_capacity(total.min(1 << 16));
    let mut index = vec![0usize; axes.len()];
    loop {
        let tuple: Vec<String> = axes
            .iter()
            .zip(&index)
            .map(|((_, terms), &i)| terms[i].clone())
            .collect();
        out.push(Combination {
            query: tuple.join(" "),
            tuple,
        });

        // Odometer increment, last axis fastest.
        let mut axis = axes.len();
        loop {
            if axis == 0 {
                return out;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < axes[axis].1.len() {
                break;
            }
            index[axis] = 0;
        }
    }
}

/// Fetch suggestions for every combination of `trends` and `groups`.
pub async fn mine_combinatorial<S: SuggestionSource>(
    source: &S,
    trends: &[String],
    groups: &[WordGroup],
    pacer: &Pacer,
    cancel: &CancellationToken,
) -> Expansion {
    let mut out = Expansion::default();
    let axes = axes(trends, groups);
    let group_names: Vec<String> = axes.iter().map(|(name, _)| (*name).to_owned()).collect();
    let combos = product(&axes);
    tracing::info!(
        combinations = combos.len(),
        trends = trends.len(),
        groups = ?group_names,
        "route B started"
    );

    let mut emitted: HashSet<String> = HashSet::new();
    for combo in combos {
        if !pacer.pause(cancel).await {
            out.cancelled = true;
            break;
        }

        out.lookups += 1;
        let suggestions = match source.fetch_suggestions(&combo.query).await {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(error = %err, "suggestion lookup failed, treating as empty");
                out.errors.push(RunError::new(
                    combo.query.clone(),
                    ErrorKind::from(&err),
                    Stage::Suggest,
                    err.to_string(),
                ));
                Vec::new()
            }
        };
        tracing::debug!(query = %combo.query, count = suggestions.len(), "suggestions fetched");

        for (suggestion, key) in distinct_suggestions(&combo.query, suggestions) {
            if emitted.insert(key) {
                out.candidates.push(Candidate {
                    keyword: suggestion,
                    route: Route::B,
                    origin: Origin::Combinatorial {
                        tuple: combo.tuple.clone(),
                    },
                    groups: group_names.clone(),
                });
            }
        }
    }

    tracing::info!(
        candidates = out.candidates.len(),
        lookups = out.lookups,
        errors = out.errors.len(),
        cancelled = out.cancelled,
        "route B finished"
    );
    out
}

//! Named word groups and keyword normalization.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{MinerError, Result};

/// Normalize a keyword for comparison: trim, lowercase, and collapse any run
/// of Unicode whitespace (including the ideographic space) into one space.
pub fn normalize_keyword(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A named, ordered, deduplicated set of terms. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordGroup {
    name: String,
    terms: Vec<String>,
    normalized: Vec<String>,
}

impl WordGroup {
    /// Build a group from terms. Blank terms are dropped; later duplicates
    /// (after normalization) are dropped in favour of the first spelling.
    pub fn new<I, S>(name: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut normalized = Vec::new();
        for term in terms {
            let trimmed = term.as_ref().trim();
            let key = normalize_keyword(trimmed);
            if key.is_empty() || !seen.insert(key.clone()) {
                continue;
            }
            kept.push(trimmed.to_owned());
            normalized.push(key);
        }
        Self {
            name: name.into(),
            terms: kept,
            normalized,
        }
    }

    /// Parse a newline-separated word list. Blank lines and lines starting
    /// with `#` are ignored.
    pub fn from_lines(name: impl Into<String>, text: &str) -> Self {
        Self::new(
            name,
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Load a word list file.
    ///
    /// # Errors
    ///
    /// Returns [`MinerError::Config`] if the file cannot be read.
    pub fn load(name: impl Into<String>, path: &Path) -> Result<Self> {
        let name = name.into();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MinerError::Config(format!(
                "cannot read word group '{name}' from {}: {e}",
                path.display()
            ))
        })?;
        let group = Self::from_lines(name, &text);
        tracing::debug!(group = group.name(), count = group.len(), "word group loaded");
        Ok(group)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Terms in load order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether any term of this group occurs inside `text`, comparing
    /// normalized forms.
    pub fn matches_within(&self, text: &str) -> bool {
        let haystack = normalize_keyword(text);
        self.normalized.iter().any(|term| haystack.contains(term.as_str()))
    }
}

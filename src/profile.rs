//! Mining profiles.
//!
//! A profile is a directory holding `profile.toml` plus the word list files
//! it references:
//!
//! ```toml
//! name = "Romance"
//! locale = "JP"
//!
//! [word_groups.seeds]
//! name = "Seeds"
//! file = "data/seeds.txt"
//!
//! [word_groups.emotions]
//! file = "data/emotions.txt"
//!
//! [[patterns]]
//! id = "route_a"
//! mode = "recursive"
//! root = "seeds"
//! filter = "emotions"
//!
//! [[patterns]]
//! id = "route_b"
//! mode = "combinatorial"
//! combination = ["seeds", "emotions"]
//! use_trend = true
//!
//! [[patterns]]
//! id = "all"
//! run_multiple = ["route_a", "route_b"]
//!
//! [ranking]
//! rank_s_days = 90
//!
//! [sniper]
//! enabled = true
//!
//! [filtering]
//! max_match_results = 1000
//!
//! [watch]
//! domains = ["rival.example"]
//! file = "data/sites.txt"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};
use crate::mining::{MiningPlan, RouteSpec};
use crate::rank::{RankPolicy, WatchList};
use crate::word_group::WordGroup;

/// File name of the profile manifest inside a profile directory.
pub const PROFILE_FILE: &str = "profile.toml";

const DEFAULT_LOCALE: &str = "JP";

/// One `[word_groups.<id>]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WordGroupSpec {
    /// Display name; defaults to the group id.
    pub name: Option<String>,
    /// Word list path, relative to the profile directory.
    pub file: Option<PathBuf>,
    pub description: Option<String>,
}

/// One `[[patterns]]` entry as written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// `recursive` or `combinatorial`. Ignored when `run_multiple` is set.
    pub mode: Option<String>,
    pub root: Option<String>,
    pub filter: Option<String>,
    pub combination: Vec<String>,
    pub use_trend: bool,
    pub run_multiple: Option<Vec<String>>,
}

impl PatternSpec {
    /// `name - description` for listings.
    pub fn label(&self) -> String {
        let base = self
            .name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("(unnamed)");
        match self.description.as_deref() {
            Some(desc) if !desc.is_empty() => format!("{base} - {desc}"),
            _ => base.to_owned(),
        }
    }
}

/// `[ranking]` staleness thresholds in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSpec {
    pub rank_s_days: u32,
    pub rank_a_days: u32,
    pub rank_b_days: u32,
}

impl Default for RankingSpec {
    fn default() -> Self {
        let policy = RankPolicy::default();
        Self {
            rank_s_days: policy.rank_s_days,
            rank_a_days: policy.rank_a_days,
            rank_b_days: policy.rank_b_days,
        }
    }
}

/// `[sniper]` settings for the SS rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SniperSpec {
    pub enabled: bool,
    pub max_competitors: u64,
    pub hours: f64,
}

impl Default for SniperSpec {
    fn default() -> Self {
        let policy = RankPolicy::default();
        Self {
            enabled: policy.sniper_enabled,
            max_competitors: policy.sniper_max_competitors,
            hours: policy.sniper_hours,
        }
    }
}

/// `[filtering]` limits applied before freshness is looked at.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringSpec {
    /// Title-match counts above this rank C straight away. 0 = no limit.
    pub max_match_results: u64,
}

/// `[watch]` competitor domains: inline, from a file, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSpec {
    pub domains: Vec<String>,
    pub file: Option<PathBuf>,
}

/// The parsed `profile.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileManifest {
    pub name: String,
    /// Geo code for the trend source.
    pub locale: Option<String>,
    pub word_groups: BTreeMap<String, WordGroupSpec>,
    pub patterns: Vec<PatternSpec>,
    pub ranking: RankingSpec,
    pub sniper: SniperSpec,
    pub filtering: FilteringSpec,
    pub watch: WatchSpec,
}

/// A loaded profile: manifest plus word group contents.
#[derive(Debug, Clone)]
pub struct Profile {
    id: String,
    dir: PathBuf,
    manifest: ProfileManifest,
    groups: BTreeMap<String, WordGroup>,
    watch: WatchList,
}

impl Profile {
    /// Load the profile in `dir`. Its id is the directory name.
    ///
    /// Missing word list files load as empty groups and are reported by
    /// [`Profile::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`MinerError::Config`] if the directory or manifest is
    /// missing or the manifest does not parse.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(MinerError::Config(format!(
                "profile directory not found: {}",
                dir.display()
            )));
        }
        let manifest_path = dir.join(PROFILE_FILE);
        let content = std::fs::read_to_string(&manifest_path).map_err(|e| {
            MinerError::Config(format!("cannot read {}: {e}", manifest_path.display()))
        })?;
        let manifest: ProfileManifest = toml::from_str(&content)
            .map_err(|e| MinerError::Config(format!("{}: {e}", manifest_path.display())))?;

        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_owned());
        Self::from_manifest(id, dir, manifest)
    }

    /// Build a profile from an already parsed manifest, resolving files
    /// relative to `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MinerError::Config`] if the watch list file is set but
    /// cannot be read.
    pub fn from_manifest(id: impl Into<String>, dir: &Path, manifest: ProfileManifest) -> Result<Self> {
        let mut groups = BTreeMap::new();
        for (group_id, spec) in &manifest.word_groups {
            let name = spec.name.clone().unwrap_or_else(|| group_id.clone());
            let group = match &spec.file {
                Some(file) => {
                    let path = dir.join(file);
                    if path.is_file() {
                        WordGroup::load(name, &path)?
                    } else {
                        tracing::warn!(group = %group_id, path = %path.display(), "word list file not found");
                        WordGroup::new(name, Vec::<String>::new())
                    }
                }
                None => WordGroup::new(name, Vec::<String>::new()),
            };
            tracing::info!(group = %group_id, count = group.len(), "word group loaded");
            groups.insert(group_id.clone(), group);
        }

        let mut domains = manifest.watch.domains.clone();
        if let Some(file) = &manifest.watch.file {
            domains.extend(WordGroup::load("watch", &dir.join(file))?.terms().iter().cloned());
        }
        let watch = WatchList::new(domains);

        Ok(Self {
            id: id.into(),
            dir: dir.to_path_buf(),
            manifest,
            groups,
            watch,
        })
    }

    /// Directory name, used to key the cache.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &ProfileManifest {
        &self.manifest
    }

    pub fn patterns(&self) -> &[PatternSpec] {
        &self.manifest.patterns
    }

    /// Loaded word group by id.
    pub fn group(&self, id: &str) -> Option<&WordGroup> {
        self.groups.get(id)
    }

    pub fn watch(&self) -> &WatchList {
        &self.watch
    }

    pub fn locale(&self) -> &str {
        self.manifest.locale.as_deref().unwrap_or(DEFAULT_LOCALE)
    }

    /// Classifier thresholds from `[ranking]` and `[sniper]`.
    pub fn rank_policy(&self) -> RankPolicy {
        RankPolicy {
            sniper_enabled: self.manifest.sniper.enabled,
            sniper_max_competitors: self.manifest.sniper.max_competitors,
            sniper_hours: self.manifest.sniper.hours,
            rank_s_days: self.manifest.ranking.rank_s_days,
            rank_a_days: self.manifest.ranking.rank_a_days,
            rank_b_days: self.manifest.ranking.rank_b_days,
            max_match_results: self.manifest.filtering.max_match_results,
        }
    }

    fn find_pattern(&self, id: &str) -> Option<&PatternSpec> {
        self.manifest
            .patterns
            .iter()
            .find(|p| p.id.as_deref() == Some(id))
    }

    /// Every problem with the profile. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.manifest.name.trim().is_empty() {
            errors.push("profile name is not set".to_owned());
        }

        if self.manifest.word_groups.is_empty() {
            errors.push("no word groups defined".to_owned());
        }
        for (group_id, spec) in &self.manifest.word_groups {
            if spec.file.is_none() {
                errors.push(format!("word group '{group_id}' has no file"));
            }
            if self.groups.get(group_id).is_none_or(WordGroup::is_empty) {
                errors.push(format!(
                    "word group '{group_id}' is empty (file missing or has no terms)"
                ));
            }
        }

        let mut seen_ids = HashSet::new();
        for pattern in &self.manifest.patterns {
            let Some(pid) = pattern.id.as_deref() else {
                errors.push("pattern without an id".to_owned());
                continue;
            };
            if !seen_ids.insert(pid) {
                errors.push(format!("duplicate pattern id '{pid}'"));
            }

            if let Some(refs) = &pattern.run_multiple {
                if refs.is_empty() {
                    errors.push(format!("pattern '{pid}' has an empty run_multiple list"));
                }
                for ref_id in refs {
                    if self.find_pattern(ref_id).is_none() {
                        errors.push(format!("pattern '{pid}' references unknown pattern '{ref_id}'"));
                    }
                }
                if let Err(MinerError::Config(msg)) = self.expand(pid, &mut Vec::new(), &mut Vec::new()) {
                    if msg.contains("cycle") {
                        errors.push(msg);
                    }
                }
                continue;
            }

            match pattern.mode.as_deref() {
                Some("recursive") => {
                    for (field, value) in [("root", &pattern.root), ("filter", &pattern.filter)] {
                        match value {
                            None => errors.push(format!("pattern '{pid}' (recursive) has no {field}")),
                            Some(group) if !self.manifest.word_groups.contains_key(group) => errors.push(
                                format!("pattern '{pid}' {field} '{group}' is not a word group"),
                            ),
                            Some(_) => {}
                        }
                    }
                }
                Some("combinatorial") => {
                    if pattern.combination.is_empty() && !pattern.use_trend {
                        errors.push(format!("pattern '{pid}' (combinatorial) has no combination"));
                    }
                    for group in &pattern.combination {
                        if !self.manifest.word_groups.contains_key(group) {
                            errors.push(format!(
                                "pattern '{pid}' combination '{group}' is not a word group"
                            ));
                        }
                    }
                }
                Some(other) => errors.push(format!("pattern '{pid}' has invalid mode '{other}'")),
                None => errors.push(format!("pattern '{pid}' has no mode")),
            }
        }

        if let Err(e) = self.rank_policy().validate() {
            errors.push(e.to_string());
        }

        errors
    }

    /// Turn pattern `id` into a mining plan. `run_multiple` patterns are
    /// flattened in order, each referenced pattern included once.
    ///
    /// # Errors
    ///
    /// Returns [`MinerError::Config`] for unknown patterns, invalid modes,
    /// unknown groups, or `run_multiple` cycles.
    pub fn plan(&self, id: &str) -> Result<MiningPlan> {
        let mut routes = Vec::new();
        self.expand(id, &mut Vec::new(), &mut routes)?;
        let policy = self.rank_policy();
        policy.validate()?;
        tracing::debug!(pattern = id, routes = routes.len(), "plan built");
        Ok(MiningPlan {
            routes,
            watch: self.watch.clone(),
            policy,
            locale: self.locale().to_owned(),
        })
    }

    fn expand(&self, id: &str, stack: &mut Vec<String>, routes: &mut Vec<RouteSpec>) -> Result<()> {
        if stack.iter().any(|s| s == id) {
            stack.push(id.to_owned());
            return Err(MinerError::Config(format!(
                "run_multiple cycle: {}",
                stack.join(" -> ")
            )));
        }
        let pattern = self
            .find_pattern(id)
            .ok_or_else(|| MinerError::Config(format!("unknown pattern '{id}'")))?;

        if let Some(refs) = &pattern.run_multiple {
            stack.push(id.to_owned());
            for ref_id in refs {
                self.expand(ref_id, stack, routes)?;
            }
            stack.pop();
            return Ok(());
        }

        let route = match pattern.mode.as_deref() {
            Some("recursive") => RouteSpec::Recursive {
                root: self.require_group(id, "root", pattern.root.as_deref())?,
                filter: self.require_group(id, "filter", pattern.filter.as_deref())?,
            },
            Some("combinatorial") => RouteSpec::Combinatorial {
                groups: pattern
                    .combination
                    .iter()
                    .map(|g| self.require_group(id, "combination", Some(g)))
                    .collect::<Result<_>>()?,
                use_trend: pattern.use_trend,
            },
            other => {
                return Err(MinerError::Config(format!(
                    "pattern '{id}' has invalid mode '{}'",
                    other.unwrap_or("")
                )));
            }
        };
        if !routes.contains(&route) {
            routes.push(route);
        }
        Ok(())
    }

    fn require_group(&self, pattern: &str, field: &str, group: Option<&str>) -> Result<WordGroup> {
        let group = group
            .ok_or_else(|| MinerError::Config(format!("pattern '{pattern}' has no {field}")))?;
        self.groups.get(group).cloned().ok_or_else(|| {
            MinerError::Config(format!("pattern '{pattern}' {field} '{group}' is not a word group"))
        })
    }
}

/// Profile directory names under `root`, sorted, skipping names that start
/// with `_` or `.` and directories without a manifest.
///
/// # Errors
///
/// Returns [`MinerError::Io`] if `root` exists but cannot be listed.
pub fn list_profiles(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        if entry.path().join(PROFILE_FILE).is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

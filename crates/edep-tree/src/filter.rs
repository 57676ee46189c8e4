//! Ancestry filtering: include or exclude a deposition by its lineage.
//!
//! A [`FilterSpec`] selects one node on the hit track's [`AncestryPath`]
//! (by level, negative levels counting from the leaf) and tests its creating
//! process and creation volume against two wildcards. A level that falls
//! outside the path never matches; deep filters fail closed on shallow
//! trees instead of raising an error.

use serde::{Deserialize, Serialize};

use crate::tree::AncestryPath;

/// What a sink does with a record whose path matches the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    /// Keep only records whose path matches.
    Include,
    /// Drop records whose path matches.
    Exclude,
}

/// An exact name, or a prefix when the pattern ends in `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Wildcard(String);

impl Wildcard {
    /// Wrap a pattern string.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Test a value against the pattern.
    pub fn matches(&self, value: &str) -> bool {
        wildcard_match(value, &self.0)
    }
}

impl From<String> for Wildcard {
    fn from(pattern: String) -> Self {
        Self(pattern)
    }
}

impl From<Wildcard> for String {
    fn from(wildcard: Wildcard) -> Self {
        wildcard.0
    }
}

impl core::fmt::Display for Wildcard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Match `value` against `pattern`.
///
/// A trailing `*` makes the rest of the pattern a prefix; anything else must
/// match exactly. `*` elsewhere in the pattern has no special meaning.
pub fn wildcard_match(value: &str, pattern: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or_else(|| value == pattern, |prefix| value.starts_with(prefix))
}

/// Ancestry filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Include or exclude on match.
    pub mode: FilterMode,
    /// Pattern for the selected node's creating process.
    pub process: Wildcard,
    /// Pattern for the selected node's creation volume.
    pub volume: Wildcard,
    /// Which node on the path to test; negative counts from the leaf.
    pub level: i64,
}

impl FilterSpec {
    /// Build a filter from its parts.
    pub fn new(
        mode: FilterMode,
        process: impl Into<String>,
        volume: impl Into<String>,
        level: i64,
    ) -> Self {
        Self {
            mode,
            process: Wildcard::new(process),
            volume: Wildcard::new(volume),
            level,
        }
    }

    /// Whether a record with this path should be kept.
    ///
    /// `Exclude` drops on match, `Include` drops on no match.
    pub fn admits(&self, path: &AncestryPath<'_>) -> bool {
        let matched = matches(path, self);
        match self.mode {
            FilterMode::Include => matched,
            FilterMode::Exclude => !matched,
        }
    }
}

/// Evaluate the filter's node test against a path, ignoring the mode.
pub fn matches(path: &AncestryPath<'_>, spec: &FilterSpec) -> bool {
    path.get(spec.level).is_some_and(|node| {
        spec.process.matches(&node.process) && spec.volume.matches(&node.volume)
    })
}

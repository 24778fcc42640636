// src/models.rs

use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use toml::Table;

// --- OPTION TYPING ---

/// The value kind of an environment option. Overrides are dispatched on it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// An array of strings. Merging appends.
    List,
    /// A table of string values. Merging updates keys.
    Mapping,
    /// A single string. The first passing entry wins.
    Text,
    /// A single boolean. The first passing entry wins.
    Flag,
}

lazy_static! {
    /// Built-in environment options and their kinds.
    pub static ref RESERVED_OPTIONS: HashMap<&'static str, OptionKind> = HashMap::from([
        ("builder", OptionKind::Flag),
        ("dependencies", OptionKind::List),
        ("dependency-groups", OptionKind::List),
        ("description", OptionKind::Text),
        ("dev-mode", OptionKind::Flag),
        ("env-exclude", OptionKind::List),
        ("env-include", OptionKind::List),
        ("env-vars", OptionKind::Mapping),
        ("extra-dependencies", OptionKind::List),
        ("features", OptionKind::List),
        ("matrix-name-format", OptionKind::Text),
        ("platforms", OptionKind::List),
        ("post-install-commands", OptionKind::List),
        ("pre-install-commands", OptionKind::List),
        ("python", OptionKind::Text),
        ("scripts", OptionKind::Mapping),
        ("skip-install", OptionKind::Flag),
        ("type", OptionKind::Text),
    ]);
}

/// The type catalog an override pass consults.
///
/// The two variants are kept apart on purpose: built-in options never need
/// external typing, while plugin options always do.
#[derive(Debug, Clone, Copy)]
pub enum OptionTypes<'a> {
    /// Only the built-in [`RESERVED_OPTIONS`].
    Reserved,
    /// Option kinds declared by an environment plugin.
    Plugin(&'a HashMap<String, OptionKind>),
}

impl OptionTypes<'_> {
    /// Looks up the declared kind of `option` in this catalog.
    pub fn kind_of(&self, option: &str) -> Option<OptionKind> {
        match self {
            Self::Reserved => RESERVED_OPTIONS.get(option).copied(),
            Self::Plugin(types) => types.get(option).copied(),
        }
    }

    /// Whether this is the built-in catalog.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved)
    }
}

// --- OVERRIDES ---

/// The signal that decides whether an override applies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OverrideSource {
    /// The current platform name.
    Platform,
    /// An environment variable of the current process.
    Env,
    /// A matrix variable of a generated environment.
    Matrix,
    /// A regular expression matched against a generated environment name.
    Name,
}

impl OverrideSource {
    /// All sources, from lowest to highest precedence.
    pub const PRECEDENCE: [Self; 4] = [Self::Env, Self::Platform, Self::Matrix, Self::Name];

    /// The key of this source inside an `overrides` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Env => "env",
            Self::Matrix => "matrix",
            Self::Name => "name",
        }
    }

    /// Whether entries of this source may carry `platform`/`env` sub-conditions.
    pub fn allows_sub_conditions(self) -> bool {
        matches!(self, Self::Matrix | Self::Name)
    }
}

impl fmt::Display for OverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One override that was applied during resolution, kept for the finalize pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOverride {
    /// The condition key (platform, variable name, matrix variable or pattern).
    pub condition: String,
    /// The value the condition was evaluated against.
    pub condition_value: String,
    /// The raw per-option override table.
    pub options: Table,
}

/// The overrides that applied to one resolved environment, grouped by source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedOverrides {
    /// Environment variable overrides.
    pub env: Vec<CachedOverride>,
    /// Platform overrides.
    pub platform: Vec<CachedOverride>,
    /// Matrix variable overrides.
    pub matrix: Vec<CachedOverride>,
    /// Name pattern overrides.
    pub name: Vec<CachedOverride>,
}

impl CachedOverrides {
    /// Returns the entries recorded for `source`.
    pub fn get(&self, source: OverrideSource) -> &[CachedOverride] {
        match source {
            OverrideSource::Env => &self.env,
            OverrideSource::Platform => &self.platform,
            OverrideSource::Matrix => &self.matrix,
            OverrideSource::Name => &self.name,
        }
    }

    /// Records an applied override under `source`.
    pub fn push(&mut self, source: OverrideSource, entry: CachedOverride) {
        match source {
            OverrideSource::Env => self.env.push(entry),
            OverrideSource::Platform => self.platform.push(entry),
            OverrideSource::Matrix => self.matrix.push(entry),
            OverrideSource::Name => self.name.push(entry),
        }
    }

    /// Whether no override was recorded at all.
    pub fn is_empty(&self) -> bool {
        OverrideSource::PRECEDENCE
            .iter()
            .all(|source| self.get(*source).is_empty())
    }
}

// --- MATRICES ---

/// One variable of an axis-map together with its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixAxis {
    /// The variable name. The Python variable is always stored as `python`.
    pub variable: String,
    /// The ordered, unique values.
    pub values: Vec<String>,
}

/// One validated element of a `matrix` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisMap {
    /// The axes in generation order. A Python axis, if any, comes first.
    pub axes: Vec<MatrixAxis>,
    /// Whether the first axis is the Python axis.
    pub has_python: bool,
}

/// Metadata about an environment that was expanded through a matrix.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct MatrixData {
    /// The configuration every generated environment started from.
    pub config: Table,
    /// The generated environment names and the variable values each one was built from.
    pub envs: IndexMap<String, IndexMap<String, String>>,
}

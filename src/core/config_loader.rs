//! # Config Loader
//!
//! Reads the raw `tool.hatch` table of a project from disk.
//!
//! Two files are consulted in the project root: `pyproject.toml`, whose
//! `[tool.hatch]` table is used, and `hatch.toml`, whose top level is merged on
//! top of it. Either may be missing. Nothing is resolved here; the result is
//! handed to [`ProjectConfig`](crate::core::project::ProjectConfig) as-is.

use crate::{
    constants::{HATCH_CONFIG_FILENAME, PYPROJECT_FILENAME},
    core::errors::{ConfigError, Result},
};
use std::{fs, io, path::Path};
use toml::{Table, Value};

/// Loads and merges the configuration files found in `root`.
pub fn load_project(root: &Path) -> Result<Table> {
    let mut config = match read_toml(&root.join(PYPROJECT_FILENAME))? {
        Some(mut pyproject) => take_tool_hatch(&mut pyproject),
        None => Table::new(),
    };

    if let Some(hatch) = read_toml(&root.join(HATCH_CONFIG_FILENAME))? {
        log::debug!("Merging '{}' over project metadata.", HATCH_CONFIG_FILENAME);
        deep_merge(&mut config, hatch);
    }
    Ok(config)
}

/// Reads and parses a TOML file, returning `None` when it does not exist.
fn read_toml(path: &Path) -> Result<Option<Table>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::trace!("No configuration file at '{}'.", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    log::debug!("Reading configuration from '{}'.", path.display());
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::TomlParse {
            path: path.display().to_string(),
            source,
        })
}

fn take_tool_hatch(pyproject: &mut Table) -> Table {
    pyproject
        .get_mut("tool")
        .and_then(Value::as_table_mut)
        .and_then(|tool| tool.remove("hatch"))
        .and_then(|hatch| match hatch {
            Value::Table(table) => Some(table),
            _ => None,
        })
        .unwrap_or_default()
}

/// Merges `overlay` into `base`.
///
/// Tables merge by key, recursively. Any other value in `overlay`, arrays
/// included, replaces the one in `base`.
pub fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, overlay_value) in overlay {
        match overlay_value {
            Value::Table(overlay_table) => match base.get_mut(&key) {
                Some(Value::Table(base_table)) => deep_merge(base_table, overlay_table),
                _ => {
                    base.insert(key, Value::Table(overlay_table));
                }
            },
            overlay_value => {
                base.insert(key, overlay_value);
            }
        }
    }
}

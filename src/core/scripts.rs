//! # Script Expander
//!
//! Scripts are named command lists. A command whose first token is the name of
//! another script is replaced by that script's commands, with the rest of the
//! command line appended to each of them. A leading `-` (ignore the exit code)
//! on the reference is carried over to every spliced command.

use crate::core::errors::{ConfigError, Result};
use indexmap::IndexMap;
use toml::Value;

/// A script command split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptCommand<'a> {
    /// The first word, which may name another script.
    pub name: &'a str,
    /// Everything after the first word, possibly empty.
    pub args: &'a str,
    /// Whether the command was prefixed with `- `.
    pub ignore_exit_code: bool,
}

/// Splits `command` on its first space, skipping a leading `-` marker.
pub fn parse_script_command(command: &str) -> ScriptCommand<'_> {
    let (name, args) = command.split_once(' ').unwrap_or((command, ""));
    if name == "-" {
        let (name, args) = args.split_once(' ').unwrap_or((args, ""));
        return ScriptCommand {
            name,
            args,
            ignore_exit_code: true,
        };
    }
    ScriptCommand {
        name,
        args,
        ignore_exit_code: false,
    }
}

/// Validates a raw scripts table found at `field`.
///
/// Script names must not contain spaces, and each script is either a single
/// command or an array of commands.
pub fn parse_scripts(field: &str, raw: &Value) -> Result<IndexMap<String, Vec<String>>> {
    let table = raw
        .as_table()
        .ok_or_else(|| ConfigError::type_error(format!("Field `{}` must be a table", field)))?;

    let mut scripts = IndexMap::with_capacity(table.len());
    for (name, commands) in table {
        if name.contains(' ') {
            return Err(ConfigError::value_error(format!(
                "Script name `{}` in field `{}` must not contain spaces",
                name, field
            )));
        }

        let commands = match commands {
            Value::String(command) => vec![command.clone()],
            Value::Array(entries) => entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    entry.as_str().map(str::to_string).ok_or_else(|| {
                        ConfigError::type_error(format!(
                            "Command #{} in field `{}.{}` must be a string",
                            i + 1,
                            field,
                            name
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(ConfigError::type_error(format!(
                    "Field `{}.{}` must be a string or an array of strings",
                    field, name
                )));
            }
        };
        scripts.insert(name.clone(), commands);
    }
    Ok(scripts)
}

/// Expands every script reference in `scripts`.
///
/// The result has the same keys in the same order. A reference chain that
/// loops back on itself is an error naming the whole chain.
pub fn expand_scripts(
    field: &str,
    scripts: &IndexMap<String, Vec<String>>,
) -> Result<IndexMap<String, Vec<String>>> {
    let mut expanded = IndexMap::with_capacity(scripts.len());
    let mut active = Vec::new();
    for name in scripts.keys() {
        expand_script(field, name, scripts, &mut expanded, &mut active)?;
    }
    // Memoization inserts in completion order; restore declaration order.
    expanded.sort_by_cached_key(|name, _| scripts.get_index_of(name));
    Ok(expanded)
}

fn expand_script(
    field: &str,
    name: &str,
    scripts: &IndexMap<String, Vec<String>>,
    expanded: &mut IndexMap<String, Vec<String>>,
    active: &mut Vec<String>,
) -> Result<()> {
    if expanded.contains_key(name) {
        return Ok(());
    }
    if active.iter().any(|n| n == name) {
        active.push(name.to_string());
        return Err(ConfigError::cycle("expansion", field, active));
    }

    active.push(name.to_string());
    let mut commands = Vec::new();
    for command in scripts.get(name).map(Vec::as_slice).unwrap_or_default() {
        let parsed = parse_script_command(command);
        if !scripts.contains_key(parsed.name) {
            commands.push(command.clone());
            continue;
        }

        expand_script(field, parsed.name, scripts, expanded, active)?;
        for sub_command in expanded.get(parsed.name).into_iter().flatten() {
            let mut spliced = if parsed.args.is_empty() {
                sub_command.clone()
            } else {
                format!("{} {}", sub_command, parsed.args)
            };
            if parsed.ignore_exit_code && !sub_command.starts_with("- ") {
                spliced = format!("- {}", spliced);
            }
            commands.push(spliced);
        }
    }
    active.pop();

    log::trace!("Expanded script '{}' into {} command(s).", name, commands.len());
    expanded.insert(name.to_string(), commands);
    Ok(())
}

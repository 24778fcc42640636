//! # Matrix Expander
//!
//! Turns an environment carrying a `matrix` series into one concrete
//! environment per combination of axis values.
//!
//! Each element of the series (an axis-map) is expanded on its own through a
//! Cartesian product, and the results of all axis-maps are unioned. A Python
//! axis (`py` or `python`) is always generated first and stored as `python`.

use crate::{
    constants::DEFAULT_ENV_NAME,
    core::{
        errors::{ConfigError, Result},
        overrides::{self, OverrideContext, OverrideRules},
        value::{env_option_field, take_string},
    },
    models::{
        AxisMap, CachedOverride, CachedOverrides, MatrixAxis, MatrixData, OptionTypes,
        OverrideSource,
    },
    system::host::Host,
};
use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;
use std::collections::HashSet;
use toml::{Table, Value};

/// One environment produced by a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEnvironment {
    /// The resolved configuration.
    pub config: Table,
    /// Every override that applied, for the finalize pass.
    pub overrides: CachedOverrides,
}

/// The result of expanding one matrix root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixExpansion {
    /// Generated environments by final (prefixed) name, in generation order.
    pub environments: IndexMap<String, GeneratedEnvironment>,
    /// Metadata about the matrix root.
    pub data: MatrixData,
}

/// Checks that a `matrix-name-format` can tell combinations apart.
pub fn validate_name_format(field: &str, format: &str) -> Result<()> {
    if !format.contains("{value}") {
        return Err(ConfigError::value_error(format!(
            "Field `{}` must contain at least the `{{value}}` placeholder",
            field
        )));
    }
    Ok(())
}

/// Validates a `matrix` value and returns its axis-maps in declaration order.
pub fn parse_matrix_series(env_name: &str, matrix: &Value) -> Result<Vec<AxisMap>> {
    let field = env_option_field(env_name, "matrix");
    let series = matrix
        .as_array()
        .ok_or_else(|| ConfigError::type_error(format!("Field `{}` must be an array", field)))?;

    let mut axis_maps = Vec::with_capacity(series.len());
    for (i, entry) in series.iter().enumerate() {
        let i = i + 1;
        let entry = entry.as_table().ok_or_else(|| {
            ConfigError::type_error(format!("Entry #{} in field `{}` must be a table", i, field))
        })?;
        if entry.is_empty() {
            return Err(ConfigError::value_error(format!(
                "Matrix #{} in field `{}` cannot be empty",
                i, field
            )));
        }
        axis_maps.push(parse_axis_map(&field, i, entry)?);
    }
    Ok(axis_maps)
}

fn parse_axis_map(field: &str, i: usize, entry: &Table) -> Result<AxisMap> {
    let mut python_axis = None;
    let mut axes = Vec::with_capacity(entry.len());

    for (j, (variable, values)) in entry.iter().enumerate() {
        if variable.is_empty() {
            return Err(ConfigError::value_error(format!(
                "Variable #{} in matrix #{} in field `{}` cannot be an empty string",
                j + 1,
                i,
                field
            )));
        }

        let values = values.as_array().ok_or_else(|| {
            ConfigError::type_error(format!(
                "Variable `{}` in matrix #{} in field `{}` must be an array",
                variable, i, field
            ))
        })?;
        if values.is_empty() {
            return Err(ConfigError::value_error(format!(
                "Variable `{}` in matrix #{} in field `{}` cannot be empty",
                variable, i, field
            )));
        }

        let mut seen = HashSet::with_capacity(values.len());
        let mut parsed = Vec::with_capacity(values.len());
        for (k, value) in values.iter().enumerate() {
            let k = k + 1;
            let value = value.as_str().ok_or_else(|| {
                ConfigError::type_error(format!(
                    "Value #{} of variable `{}` in matrix #{} in field `{}` must be a string",
                    k, variable, i, field
                ))
            })?;
            if value.is_empty() {
                return Err(ConfigError::value_error(format!(
                    "Value #{} of variable `{}` in matrix #{} in field `{}` cannot be an empty string",
                    k, variable, i, field
                )));
            }
            if !seen.insert(value) {
                return Err(ConfigError::value_error(format!(
                    "Value #{} of variable `{}` in matrix #{} in field `{}` is a duplicate",
                    k, variable, i, field
                )));
            }
            parsed.push(value.to_string());
        }

        if is_python_variable(variable) {
            if python_axis.is_some() {
                return Err(ConfigError::conflict(format!(
                    "Matrix #{} in field `{}` cannot contain both `py` and `python` variables",
                    i, field
                )));
            }
            python_axis = Some(MatrixAxis {
                variable: "python".to_string(),
                values: parsed,
            });
        } else {
            axes.push(MatrixAxis {
                variable: variable.clone(),
                values: parsed,
            });
        }
    }

    let has_python = python_axis.is_some();
    if let Some(axis) = python_axis {
        axes.insert(0, axis);
    }
    Ok(AxisMap { axes, has_python })
}

fn is_python_variable(variable: &str) -> bool {
    variable == "py" || variable == "python"
}

/// Expands `env_name` into one environment per matrix combination.
///
/// `base_config` is the environment after templates and the `env`/`platform`
/// overrides, without its `matrix`, `overrides` and `matrix-name-format` keys.
/// `inherited` holds the overrides already applied to it; every generated
/// environment starts from a copy of them.
pub fn expand_matrix(
    env_name: &str,
    base_config: &Table,
    axis_maps: &[AxisMap],
    rules: &OverrideRules,
    name_format: &str,
    inherited: &CachedOverrides,
    host: &Host,
) -> Result<MatrixExpansion> {
    validate_name_format(&env_option_field(env_name, "matrix-name-format"), name_format)?;
    let name_patterns = compile_name_patterns(env_name, rules)?;

    let mut expansion = MatrixExpansion {
        environments: IndexMap::new(),
        data: MatrixData {
            config: base_config.clone(),
            envs: IndexMap::new(),
        },
    };

    for axis_map in axis_maps {
        let combinations = axis_map
            .axes
            .iter()
            .map(|axis| axis.values.iter())
            .multi_cartesian_product();

        for combination in combinations {
            let variables: IndexMap<String, String> = axis_map
                .axes
                .iter()
                .map(|axis| axis.variable.clone())
                .zip(combination.into_iter().cloned())
                .collect();

            let (name, generated) = generate(
                env_name,
                base_config,
                axis_map.has_python,
                &variables,
                rules,
                &name_patterns,
                name_format,
                inherited,
                host,
            )?;

            if expansion.environments.contains_key(&name) {
                return Err(ConfigError::value_error(format!(
                    "Matrix in field `{}` generates the environment `{}` more than once",
                    env_option_field(env_name, "matrix"),
                    name
                )));
            }
            log::trace!("Matrix '{}' generated environment '{}'.", env_name, name);
            expansion.data.envs.insert(name.clone(), variables);
            expansion.environments.insert(name, generated);
        }
    }

    log::debug!(
        "Expanded matrix '{}' into {} environment(s).",
        env_name,
        expansion.environments.len()
    );
    Ok(expansion)
}

fn compile_name_patterns<'a>(
    env_name: &str,
    rules: &'a OverrideRules,
) -> Result<Vec<(Regex, &'a str, &'a Table)>> {
    rules
        .get(OverrideSource::Name)
        .iter()
        .map(|(pattern, options)| {
            let regex = Regex::new(pattern).map_err(|e| {
                ConfigError::value_error(format!(
                    "Field `{}` is not a valid regular expression: {}",
                    env_option_field(env_name, &format!("overrides.name.{}", pattern)),
                    e
                ))
            })?;
            Ok((regex, pattern.as_str(), options))
        })
        .collect()
}

fn generate(
    env_name: &str,
    base_config: &Table,
    has_python: bool,
    variables: &IndexMap<String, String>,
    rules: &OverrideRules,
    name_patterns: &[(Regex, &str, &Table)],
    name_format: &str,
    inherited: &CachedOverrides,
    host: &Host,
) -> Result<(String, GeneratedEnvironment)> {
    let mut config = base_config.clone();
    let mut cached = inherited.clone();

    if has_python {
        if let Some(python) = variables.get("python") {
            config.insert("python".to_string(), Value::from(python.as_str()));
        }
    }

    for (condition, options) in rules.get(OverrideSource::Matrix) {
        let variable = if is_python_variable(condition) {
            "python"
        } else {
            condition.as_str()
        };
        let Some(condition_value) = variables.get(variable) else {
            continue;
        };
        let ctx = OverrideContext {
            env_name,
            source: OverrideSource::Matrix,
            condition,
            condition_value,
            host,
        };
        overrides::apply_overrides(&ctx, options, &mut config, OptionTypes::Reserved)?;
        cached.push(
            OverrideSource::Matrix,
            CachedOverride {
                condition: condition.clone(),
                condition_value: condition_value.clone(),
                options: options.clone(),
            },
        );
    }

    let format_field = env_option_field(env_name, "matrix-name-format");
    let format = match take_string(&mut config, "matrix-name-format", &format_field)? {
        Some(format) => {
            validate_name_format(&format_field, &format)?;
            format
        }
        None => name_format.to_string(),
    };
    let name = format_name(&format, has_python, variables);

    for (regex, pattern, options) in name_patterns {
        if !regex.is_match(&name) {
            continue;
        }
        let ctx = OverrideContext {
            env_name,
            source: OverrideSource::Name,
            condition: pattern,
            condition_value: &name,
            host,
        };
        overrides::apply_overrides(&ctx, options, &mut config, OptionTypes::Reserved)?;
        cached.push(
            OverrideSource::Name,
            CachedOverride {
                condition: pattern.to_string(),
                condition_value: name.clone(),
                options: (*options).clone(),
            },
        );
    }

    let name = if env_name == DEFAULT_ENV_NAME {
        name
    } else {
        format!("{}.{}", env_name, name)
    };
    Ok((
        name,
        GeneratedEnvironment {
            config,
            overrides: cached,
        },
    ))
}

/// Builds the unprefixed name of one combination.
fn format_name(format: &str, has_python: bool, variables: &IndexMap<String, String>) -> String {
    variables
        .iter()
        .enumerate()
        .map(|(i, (variable, value))| {
            if i == 0 && has_python {
                if value.starts_with("py") {
                    value.clone()
                } else {
                    format!("py{}", value)
                }
            } else {
                format
                    .replace("{variable}", variable)
                    .replace("{value}", value)
            }
        })
        .join("-")
}

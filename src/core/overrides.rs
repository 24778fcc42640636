//! # Override Engine
//!
//! Applies conditional option overrides to an environment configuration.
//!
//! An `overrides` table is keyed by source (`platform`, `env`, `matrix`, `name`),
//! then by condition (a platform, a variable name or a name pattern), then by
//! option. Options prefixed with `set-` overwrite the current value; all others
//! merge into it. How a value merges depends on the option's [`OptionKind`].

use crate::{
    constants::ENVS_FIELD,
    core::{
        errors::{ConfigError, Result},
        value::{self, env_option_field},
    },
    models::{OptionKind, OptionTypes, OverrideSource, RESERVED_OPTIONS},
    system::host::Host,
};
use indexmap::IndexMap;
use toml::{Table, Value};

/// Everything an override entry needs to know about where it was declared and
/// which condition value it is being evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct OverrideContext<'a> {
    /// The environment the overrides were declared on.
    pub env_name: &'a str,
    /// The source table the overrides came from.
    pub source: OverrideSource,
    /// The condition key under that source.
    pub condition: &'a str,
    /// The value the condition matched (platform, variable value, matrix value or env name).
    pub condition_value: &'a str,
    /// Platform and environment variables for `platform`/`env` sub-conditions.
    pub host: &'a Host,
}

impl OverrideContext<'_> {
    fn field(&self, option: &str) -> String {
        format!(
            "{}.{}.overrides.{}.{}.{}",
            ENVS_FIELD, self.env_name, self.source, self.condition, option
        )
    }
}

/// A handler merges (or overwrites) one override value into the target config.
type OverrideHandler = fn(&OverrideContext<'_>, &str, &Value, &mut Table, bool) -> Result<()>;

fn handler_for(kind: OptionKind) -> OverrideHandler {
    match kind {
        OptionKind::List => apply_list_override,
        OptionKind::Mapping => apply_mapping_override,
        OptionKind::Text => apply_text_override,
        OptionKind::Flag => apply_flag_override,
    }
}

// --- PUBLIC API ---

/// Applies every option of one override condition to `target`.
///
/// With [`OptionTypes::Reserved`], options of unknown kind are left alone unless
/// they are written as a table with a `value` key. With [`OptionTypes::Plugin`],
/// built-in options are skipped (the reserved pass already applied them) and an
/// untyped option without a `value` key is an error.
pub fn apply_overrides(
    ctx: &OverrideContext<'_>,
    options: &Table,
    target: &mut Table,
    option_types: OptionTypes<'_>,
) -> Result<()> {
    for (raw_option, data) in options {
        let (option, overwrite) = match raw_option.strip_prefix("set-") {
            Some(option) => (option, true),
            None => (raw_option.as_str(), false),
        };

        if !option_types.is_reserved() && RESERVED_OPTIONS.contains_key(option) {
            continue;
        }

        if let Some(kind) = option_types.kind_of(option) {
            handler_for(kind)(ctx, option, data, target, overwrite)?;
            continue;
        }

        match data {
            Value::Table(entry) if entry.contains_key("value") => {
                if resolve_condition(ctx, option, entry, None)? {
                    if let Some(value) = entry.get("value") {
                        target.insert(option.to_string(), value.clone());
                    }
                }
            }
            _ if option_types.is_reserved() => {
                log::trace!(
                    "Deferring untyped override `{}` until plugin option types are known.",
                    ctx.field(raw_option)
                );
            }
            _ => {
                return Err(ConfigError::conflict(format!(
                    "Untyped option `{}` must be defined as a table with a `value` key",
                    ctx.field(raw_option)
                )));
            }
        }
    }
    Ok(())
}

/// The validated `overrides` table of one environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideRules {
    env: IndexMap<String, Table>,
    platform: IndexMap<String, Table>,
    matrix: IndexMap<String, Table>,
    name: IndexMap<String, Table>,
}

impl OverrideRules {
    /// Removes `overrides` from `config` and validates its shape.
    pub fn take_from(env_name: &str, config: &mut Table) -> Result<Self> {
        let field = env_option_field(env_name, "overrides");
        let raw = match config.remove("overrides") {
            None => return Ok(Self::default()),
            Some(Value::Table(table)) => table,
            Some(_) => {
                return Err(ConfigError::type_error(format!(
                    "Field `{}` must be a table",
                    field
                )));
            }
        };

        let mut rules = Self::default();
        for (source_name, conditions) in &raw {
            let source = match source_name.as_str() {
                "env" => OverrideSource::Env,
                "platform" => OverrideSource::Platform,
                "matrix" => OverrideSource::Matrix,
                "name" => OverrideSource::Name,
                other => {
                    log::warn!("Ignoring unknown override source `{}.{}`.", field, other);
                    continue;
                }
            };
            let source_field = format!("{}.{}", field, source_name);
            let conditions = value::expect_table(conditions, &source_field)?;
            let parsed = rules.get_mut(source);
            for (condition, options) in conditions {
                let options =
                    value::expect_table(options, &format!("{}.{}", source_field, condition))?;
                parsed.insert(condition.clone(), options.clone());
            }
        }
        Ok(rules)
    }

    /// The conditions declared for `source`, in declaration order.
    pub fn get(&self, source: OverrideSource) -> &IndexMap<String, Table> {
        match source {
            OverrideSource::Env => &self.env,
            OverrideSource::Platform => &self.platform,
            OverrideSource::Matrix => &self.matrix,
            OverrideSource::Name => &self.name,
        }
    }

    fn get_mut(&mut self, source: OverrideSource) -> &mut IndexMap<String, Table> {
        match source {
            OverrideSource::Env => &mut self.env,
            OverrideSource::Platform => &mut self.platform,
            OverrideSource::Matrix => &mut self.matrix,
            OverrideSource::Name => &mut self.name,
        }
    }
}

// --- CONDITIONS ---

/// Evaluates the `if`, `platform` and `env` gates of one override entry.
fn resolve_condition(
    ctx: &OverrideContext<'_>,
    option: &str,
    entry: &Table,
    index: Option<usize>,
) -> Result<bool> {
    let location = match index {
        Some(i) => format!("entry #{} in field", i),
        None => "field".to_string(),
    };
    let field = ctx.field(option);

    if let Some(allowed) = entry.get("if") {
        let allowed = allowed.as_array().ok_or_else(|| {
            ConfigError::type_error(format!(
                "Option `if` in {} `{}` must be an array",
                location, field
            ))
        })?;
        if !allowed
            .iter()
            .any(|value| value.as_str() == Some(ctx.condition_value))
        {
            return Ok(false);
        }
    }

    if !ctx.source.allows_sub_conditions() {
        return Ok(true);
    }

    if let Some(platforms) = entry.get("platform") {
        let platforms = string_items(platforms, "platform", &location, &field)?;
        if !platforms.contains(&ctx.host.platform()) {
            return Ok(false);
        }
    }

    if let Some(env_vars) = entry.get("env") {
        for required in string_items(env_vars, "env", &location, &field)? {
            let matched = match required.split_once('=') {
                Some((name, expected)) => ctx.host.env_var(name) == Some(expected),
                None => ctx.host.env_var(required).is_some(),
            };
            if !matched {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

fn string_items<'a>(
    value: &'a Value,
    option: &str,
    location: &str,
    field: &str,
) -> Result<Vec<&'a str>> {
    let items = value.as_array().ok_or_else(|| {
        ConfigError::type_error(format!(
            "Option `{}` in {} `{}` must be an array",
            option, location, field
        ))
    })?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str().ok_or_else(|| {
                ConfigError::type_error(format!(
                    "Item #{} in option `{}` in {} `{}` must be a string",
                    i + 1,
                    option,
                    location,
                    field
                ))
            })
        })
        .collect()
}

// --- HANDLERS ---

fn apply_list_override(
    ctx: &OverrideContext<'_>,
    option: &str,
    data: &Value,
    target: &mut Table,
    overwrite: bool,
) -> Result<()> {
    let field = ctx.field(option);
    let entries = value::expect_array(data, &field)?;

    let mut new_items = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let i = i + 1;
        match entry {
            Value::String(_) => new_items.push(entry.clone()),
            Value::Table(table) => {
                let value = table.get("value").ok_or_else(|| {
                    ConfigError::value_error(format!(
                        "Entry #{} in field `{}` must have an option named `value`",
                        i, field
                    ))
                })?;
                let value = value.as_str().ok_or_else(|| {
                    ConfigError::type_error(format!(
                        "Option `value` in entry #{} in field `{}` must be a string",
                        i, field
                    ))
                })?;
                if value.is_empty() {
                    return Err(ConfigError::value_error(format!(
                        "Option `value` in entry #{} in field `{}` cannot be an empty string",
                        i, field
                    )));
                }
                if resolve_condition(ctx, option, table, Some(i))? {
                    new_items.push(Value::from(value));
                }
            }
            _ => {
                return Err(ConfigError::type_error(format!(
                    "Entry #{} in field `{}` must be a string or an inline table",
                    i, field
                )));
            }
        }
    }

    if overwrite {
        target.insert(option.to_string(), Value::Array(new_items));
    } else if let Some(existing) = target.get_mut(option) {
        let items = existing.as_array_mut().ok_or_else(|| {
            ConfigError::type_error(format!(
                "Field `{}` must be an array",
                env_option_field(ctx.env_name, option)
            ))
        })?;
        items.extend(new_items);
    } else if !new_items.is_empty() {
        target.insert(option.to_string(), Value::Array(new_items));
    }
    Ok(())
}

fn apply_mapping_override(
    ctx: &OverrideContext<'_>,
    option: &str,
    data: &Value,
    target: &mut Table,
    overwrite: bool,
) -> Result<()> {
    let field = ctx.field(option);
    let mut new_mapping = Table::new();

    match data {
        Value::String(pair) => {
            let (key, value) = split_pair(pair, ctx.condition_value);
            new_mapping.insert(key.to_string(), Value::from(value));
        }
        Value::Array(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                let i = i + 1;
                match entry {
                    Value::String(pair) => {
                        let (key, value) = split_pair(pair, ctx.condition_value);
                        new_mapping.insert(key.to_string(), Value::from(value));
                    }
                    Value::Table(table) => {
                        let key = table.get("key").ok_or_else(|| {
                            ConfigError::value_error(format!(
                                "Entry #{} in field `{}` must have an option named `key`",
                                i, field
                            ))
                        })?;
                        let key = key.as_str().ok_or_else(|| {
                            ConfigError::type_error(format!(
                                "Option `key` in entry #{} in field `{}` must be a string",
                                i, field
                            ))
                        })?;
                        if key.is_empty() {
                            return Err(ConfigError::value_error(format!(
                                "Option `key` in entry #{} in field `{}` cannot be an empty string",
                                i, field
                            )));
                        }
                        let value = match table.get("value") {
                            None => ctx.condition_value,
                            Some(Value::String(value)) => value.as_str(),
                            Some(_) => {
                                return Err(ConfigError::type_error(format!(
                                    "Option `value` in entry #{} in field `{}` must be a string",
                                    i, field
                                )));
                            }
                        };
                        if resolve_condition(ctx, option, table, Some(i))? {
                            new_mapping.insert(key.to_string(), Value::from(value));
                        }
                    }
                    _ => {
                        return Err(ConfigError::type_error(format!(
                            "Entry #{} in field `{}` must be a string or an inline table",
                            i, field
                        )));
                    }
                }
            }
        }
        _ => {
            return Err(ConfigError::type_error(format!(
                "Field `{}` must be a string or an array",
                field
            )));
        }
    }

    if overwrite {
        target.insert(option.to_string(), Value::Table(new_mapping));
    } else if let Some(existing) = target.get_mut(option) {
        let mapping = existing.as_table_mut().ok_or_else(|| {
            ConfigError::type_error(format!(
                "Field `{}` must be a table",
                env_option_field(ctx.env_name, option)
            ))
        })?;
        for (key, value) in new_mapping {
            mapping.insert(key, value);
        }
    } else if !new_mapping.is_empty() {
        target.insert(option.to_string(), Value::Table(new_mapping));
    }
    Ok(())
}

/// `KEY=VALUE` or a bare `KEY`, whose value then defaults to the condition value.
fn split_pair<'a>(pair: &'a str, default: &'a str) -> (&'a str, &'a str) {
    pair.split_once('=').unwrap_or((pair, default))
}

/// The scalar kinds where the first applicable entry wins.
#[derive(Debug, Clone, Copy)]
enum Scalar {
    Text,
    Flag,
}

impl Scalar {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_str(),
            Self::Flag => value.is_bool(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Flag => "boolean",
        }
    }
}

fn apply_text_override(
    ctx: &OverrideContext<'_>,
    option: &str,
    data: &Value,
    target: &mut Table,
    _overwrite: bool,
) -> Result<()> {
    apply_scalar_override(ctx, option, data, target, Scalar::Text)
}

fn apply_flag_override(
    ctx: &OverrideContext<'_>,
    option: &str,
    data: &Value,
    target: &mut Table,
    _overwrite: bool,
) -> Result<()> {
    apply_scalar_override(ctx, option, data, target, Scalar::Flag)
}

fn apply_scalar_override(
    ctx: &OverrideContext<'_>,
    option: &str,
    data: &Value,
    target: &mut Table,
    scalar: Scalar,
) -> Result<()> {
    let field = ctx.field(option);

    match data {
        literal if scalar.accepts(literal) => {
            target.insert(option.to_string(), literal.clone());
        }
        Value::Table(table) => {
            let value = table.get("value").ok_or_else(|| {
                ConfigError::value_error(format!(
                    "Field `{}` must have an option named `value`",
                    field
                ))
            })?;
            if !scalar.accepts(value) {
                return Err(ConfigError::type_error(format!(
                    "Option `value` in field `{}` must be a {}",
                    field,
                    scalar.name()
                )));
            }
            if resolve_condition(ctx, option, table, None)? {
                target.insert(option.to_string(), value.clone());
            }
        }
        Value::Array(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                let i = i + 1;
                match entry {
                    literal if scalar.accepts(literal) => {
                        target.insert(option.to_string(), literal.clone());
                        break;
                    }
                    Value::Table(table) => {
                        let value = table.get("value").ok_or_else(|| {
                            ConfigError::value_error(format!(
                                "Entry #{} in field `{}` must have an option named `value`",
                                i, field
                            ))
                        })?;
                        if !scalar.accepts(value) {
                            return Err(ConfigError::type_error(format!(
                                "Option `value` in entry #{} in field `{}` must be a {}",
                                i,
                                field,
                                scalar.name()
                            )));
                        }
                        if resolve_condition(ctx, option, table, Some(i))? {
                            target.insert(option.to_string(), value.clone());
                            break;
                        }
                    }
                    _ => {
                        return Err(ConfigError::type_error(format!(
                            "Entry #{} in field `{}` must be a {} or an inline table",
                            i,
                            field,
                            scalar.name()
                        )));
                    }
                }
            }
        }
        _ => {
            return Err(ConfigError::type_error(format!(
                "Field `{}` must be a {}, inline table, or an array",
                field,
                scalar.name()
            )));
        }
    }
    Ok(())
}

//! # Value helpers
//!
//! The raw configuration is an insertion-ordered `toml::Table`. These helpers give
//! it the "read or insert a default" accessors the resolver relies on, and turn
//! kind mismatches into errors that carry the fully qualified field path.

use crate::constants::ENVS_FIELD;
use crate::core::errors::{ConfigError, Result};
use toml::{Table, Value};

/// Returns `tool.hatch.envs.<env_name>`.
pub fn env_field(env_name: &str) -> String {
    format!("{}.{}", ENVS_FIELD, env_name)
}

/// Returns `tool.hatch.envs.<env_name>.<option>`.
pub fn env_option_field(env_name: &str, option: &str) -> String {
    format!("{}.{}.{}", ENVS_FIELD, env_name, option)
}

/// Borrows `value` as a table or fails with "Field `<field>` must be a table".
pub fn expect_table<'a>(value: &'a Value, field: &str) -> Result<&'a Table> {
    value
        .as_table()
        .ok_or_else(|| ConfigError::type_error(format!("Field `{}` must be a table", field)))
}

/// Borrows `value` as an array or fails with "Field `<field>` must be an array".
pub fn expect_array<'a>(value: &'a Value, field: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| ConfigError::type_error(format!("Field `{}` must be an array", field)))
}

/// Removes `key` from `table` and returns it as a string, if present.
pub fn take_string(table: &mut Table, key: &str, field: &str) -> Result<Option<String>> {
    match table.remove(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ConfigError::type_error(format!(
            "Field `{}` must be a string",
            field
        ))),
    }
}

/// Removes `key` from `table` and returns it as a boolean, if present.
pub fn take_bool(table: &mut Table, key: &str, field: &str) -> Result<Option<bool>> {
    match table.remove(key) {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(b)),
        Some(_) => Err(ConfigError::type_error(format!(
            "Field `{}` must be a boolean",
            field
        ))),
    }
}

/// Returns the table stored under `key`, inserting an empty one when the key is absent.
///
/// Yields `None` when the key exists but holds something other than a table.
pub fn table_or_insert<'a>(table: &'a mut Table, key: &str) -> Option<&'a mut Table> {
    table
        .entry(key.to_string())
        .or_insert_with(|| Value::Table(Table::new()))
        .as_table_mut()
}

/// Inserts `value` under `key` only when the key is absent.
pub fn set_if_absent(table: &mut Table, key: &str, value: &Value) {
    if !table.contains_key(key) {
        table.insert(key.to_string(), value.clone());
    }
}

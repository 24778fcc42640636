//! # Template Resolver
//!
//! Flattens `template` inheritance so every environment becomes self-contained.
//! Parents are resolved before children; a child keeps its own keys and receives
//! the parent's missing ones, except `matrix`, which is never inherited, and
//! `scripts`, which is merged script by script.

use crate::{
    constants::{DEFAULT_ENV_NAME, DEFAULT_ENV_TYPE, ENVS_FIELD},
    core::{
        errors::{ConfigError, Result},
        value::{self, env_option_field},
    },
};
use indexmap::IndexMap;
use std::collections::HashSet;
use toml::{Table, Value};

/// Resolves the `template` chain of every environment in `config`, in place.
///
/// The `template` and `detached` keys are consumed. A detached environment
/// templates from itself and gets `skip-install = true`.
pub fn resolve_templates(config: &mut IndexMap<String, Table>) -> Result<()> {
    let mut templates = IndexMap::with_capacity(config.len());
    for (env_name, data) in config.iter_mut() {
        templates.insert(env_name.clone(), take_template(env_name, data)?);
    }

    let env_names: Vec<String> = config.keys().cloned().collect();
    let mut seen = HashSet::new();
    let mut active = Vec::new();
    for env_name in &env_names {
        resolve_environment(env_name, config, &templates, &mut seen, &mut active)?;
    }
    Ok(())
}

fn take_template(env_name: &str, data: &mut Table) -> Result<String> {
    let detached = value::take_bool(data, "detached", &env_option_field(env_name, "detached"))?
        .unwrap_or(false);
    let template = value::take_string(data, "template", &env_option_field(env_name, "template"))?
        .unwrap_or_else(|| DEFAULT_ENV_NAME.to_string());

    if detached {
        data.insert("skip-install".to_string(), Value::Boolean(true));
        return Ok(env_name.to_string());
    }
    Ok(template)
}

fn resolve_environment(
    env_name: &str,
    config: &mut IndexMap<String, Table>,
    templates: &IndexMap<String, String>,
    seen: &mut HashSet<String>,
    active: &mut Vec<String>,
) -> Result<()> {
    if seen.contains(env_name) {
        return Ok(());
    }

    let template_name = templates
        .get(env_name)
        .map(String::as_str)
        .unwrap_or(DEFAULT_ENV_NAME);

    if !config.contains_key(template_name) {
        return Err(ConfigError::value_error(format!(
            "Field `{}` refers to an unknown environment `{}`",
            env_option_field(env_name, "template"),
            template_name
        )));
    }
    if active.iter().any(|name| name == env_name) {
        active.push(env_name.to_string());
        return Err(ConfigError::cycle(
            "inheritance",
            format!("{}.*.template", ENVS_FIELD),
            active,
        ));
    }

    if template_name == env_name {
        // Root of a chain: nothing to inherit.
        if let Some(data) = config.get_mut(env_name) {
            value::set_if_absent(data, "type", &Value::from(DEFAULT_ENV_TYPE));
        }
        seen.insert(env_name.to_string());
        return Ok(());
    }

    active.push(env_name.to_string());
    resolve_environment(template_name, config, templates, seen, active)?;

    let parent = config.get(template_name).cloned().unwrap_or_default();
    if let Some(data) = config.get_mut(env_name) {
        log::trace!("Environment '{}' inherits from '{}'.", env_name, template_name);
        inherit(env_name, template_name, data, &parent)?;
    }

    seen.insert(env_name.to_string());
    active.pop();
    Ok(())
}

fn inherit(env_name: &str, template_name: &str, data: &mut Table, parent: &Table) -> Result<()> {
    for (key, parent_value) in parent {
        match key.as_str() {
            "matrix" => continue,
            "scripts" => {
                let parent_scripts =
                    value::expect_table(parent_value, &env_option_field(template_name, "scripts"))?;
                let scripts = value::table_or_insert(data, "scripts").ok_or_else(|| {
                    ConfigError::type_error(format!(
                        "Field `{}` must be a table",
                        env_option_field(env_name, "scripts")
                    ))
                })?;
                for (script, commands) in parent_scripts {
                    value::set_if_absent(scripts, script, commands);
                }
            }
            _ => value::set_if_absent(data, key, parent_value),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn envs(source: &str) -> IndexMap<String, Table> {
        let raw: Table = toml::from_str(source).unwrap();
        raw.into_iter()
            .map(|(name, data)| (name, data.as_table().cloned().unwrap()))
            .collect()
    }

    #[test]
    fn test_child_inherits_missing_keys_only() {
        let mut config = envs(
            r#"
            [default]
            python = "3.12"
            dependencies = ["pytest"]

            [lint]
            dependencies = ["ruff"]
            "#,
        );
        resolve_templates(&mut config).unwrap();

        let lint = &config["lint"];
        assert_eq!(lint["python"].as_str(), Some("3.12"));
        assert_eq!(lint["dependencies"], Value::from(vec!["ruff"]));
        assert_eq!(lint["type"].as_str(), Some("virtual"));
        assert!(!lint.contains_key("template"));
    }

    #[test]
    fn test_scripts_merge_per_script_and_matrix_is_not_inherited() {
        let mut config = envs(
            r#"
            [default]
            matrix = [{ python = ["3.11"] }]
            scripts = { test = "pytest", cov = "coverage run" }

            [docs]
            scripts = { test = "mkdocs build --strict" }
            "#,
        );
        resolve_templates(&mut config).unwrap();

        let docs = &config["docs"];
        assert!(!docs.contains_key("matrix"));
        assert_eq!(docs["scripts"]["test"].as_str(), Some("mkdocs build --strict"));
        assert_eq!(docs["scripts"]["cov"].as_str(), Some("coverage run"));
    }

    #[test]
    fn test_multi_level_chain() {
        let mut config = envs(
            r#"
            [default]
            python = "3.10"

            [base]
            features = ["cli"]

            [leaf]
            template = "base"
            "#,
        );
        resolve_templates(&mut config).unwrap();

        assert_eq!(config["leaf"]["features"], Value::from(vec!["cli"]));
        assert_eq!(config["leaf"]["python"].as_str(), Some("3.10"));
    }

    #[test]
    fn test_detached_environment_templates_from_itself() {
        let mut config = envs(
            r#"
            [default]
            dependencies = ["pytest"]

            [tools]
            detached = true
            template = "default"
            "#,
        );
        resolve_templates(&mut config).unwrap();

        let tools = &config["tools"];
        assert!(!tools.contains_key("dependencies"));
        assert_eq!(tools["skip-install"].as_bool(), Some(true));
        assert_eq!(tools["type"].as_str(), Some("virtual"));
        assert!(!tools.contains_key("detached"));
    }

    #[test]
    fn test_unknown_template() {
        let mut config = envs("[default]\n[foo]\ntemplate = 'bar'");
        let err = resolve_templates(&mut config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field `tool.hatch.envs.foo.template` refers to an unknown environment `bar`"
        );
    }

    #[test]
    fn test_cycle_reports_full_chain() {
        let mut config = envs(
            r#"
            [default]
            [a]
            template = "b"
            [b]
            template = "c"
            [c]
            template = "a"
            "#,
        );
        let err = resolve_templates(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::Cycle { .. }));
        assert!(err.to_string().contains("a -> b -> c -> a"), "{}", err);
    }

    #[test]
    fn test_template_must_be_string() {
        let mut config = envs("[default]\n[foo]\ntemplate = 9");
        let err = resolve_templates(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::Type { .. }));
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let source = r#"
            [default]
            python = "3.9"
            [a]
            template = "b"
            [b]
            env-vars = { X = "1" }
        "#;
        let mut first = envs(source);
        let mut second = envs(source);
        resolve_templates(&mut first).unwrap();
        resolve_templates(&mut second).unwrap();
        assert_eq!(first, second);
    }
}

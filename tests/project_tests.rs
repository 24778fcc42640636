//! End-to-end resolution tests.
//!
//! Drives `ProjectConfig` from files on disk through collectors, templates,
//! matrices, overrides and the finalize pass.

use envmatrix::{
    ConfigError, Host, ProjectConfig,
    core::{
        collectors::{BuiltinCollectors, CollectorRegistry, EnvironmentCollector},
        config_loader,
    },
    models::OptionKind,
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use std::{collections::HashMap, fs};
use tempfile::TempDir;
use toml::{Table, Value};

fn project_from(source: &str) -> ProjectConfig {
    ProjectConfig::new(toml::from_str(source).unwrap()).with_host(Host::new("linux"))
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_resolves_project_from_disk() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("pyproject.toml"),
        r#"
        [project]
        name = "demo"

        [tool.hatch.envs.default]
        dependencies = ["pytest"]

        [tool.hatch.envs.test]
        matrix = [{ python = ["3.11", "3.12"] }]
        "#,
    )
    .unwrap();
    fs::write(
        dir.path().join("hatch.toml"),
        r#"
        [envs.test.overrides]
        matrix.python.features = [{ value = "speedups", if = ["3.12"] }]

        [scripts]
        cov = "test --cov"
        test = "pytest"
        "#,
    )
    .unwrap();

    let raw = config_loader::load_project(dir.path()).unwrap();
    let mut project = ProjectConfig::new(raw).with_host(Host::new("linux"));

    let envs = project.envs().unwrap();
    assert_eq!(
        envs.keys().collect::<Vec<_>>(),
        vec!["default", "test.py3.11", "test.py3.12"]
    );
    assert!(!envs["test.py3.11"].contains_key("features"));
    assert_eq!(envs["test.py3.12"]["features"], Value::from(vec!["speedups"]));
    assert_eq!(project.scripts().unwrap()["cov"], vec!["pytest --cov"]);
}

// =============================================================================
// Determinism and precedence
// =============================================================================

#[test]
fn test_resolution_is_deterministic() {
    let source = r#"
        [envs.default]
        python = "3.12"
        [envs.lint]
        detached = true
        dependencies = ["ruff"]
        [envs.docs]
        template = "lint"
        env-vars = { SITE = "public" }
    "#;
    let first = project_from(source).envs().unwrap().clone();
    let second = project_from(source).envs().unwrap().clone();
    assert_eq!(first, second);
    assert!(!first["docs"].contains_key("python"));
    assert_eq!(first["docs"]["skip-install"].as_bool(), Some(true));
}

#[test]
fn test_override_precedence_on_generated_environment() {
    let mut project = ProjectConfig::new(
        toml::from_str(
            r#"
            [envs.test]
            matrix = [{ db = ["pg", "mysql"] }]

            [envs.test.overrides]
            env.CI.description = "env"
            platform.linux.description = "platform"
            matrix.db.description = [{ value = "matrix", if = ["pg", "mysql"] }]
            name."mysql$".description = "name"
            "#,
        )
        .unwrap(),
    )
    .with_host(Host::new("linux").with_env_var("CI", "1"));

    let envs = project.envs().unwrap();
    assert_eq!(envs["test.pg"]["description"].as_str(), Some("matrix"));
    assert_eq!(envs["test.mysql"]["description"].as_str(), Some("name"));
}

#[test]
fn test_generated_count_matches_series() {
    let mut project = project_from(
        r#"
        [envs.test]
        matrix = [
            { python = ["3.10", "3.11", "3.12"], db = ["pg", "sqlite"] },
            { python = ["3.13"], db = ["pg"], orm = ["sqlalchemy", "django"] },
        ]
        "#,
    );
    let variables = project.matrix_variables().unwrap();
    assert_eq!(variables.len(), 3 * 2 + 2);
    assert_eq!(variables["test.py3.13-pg-django"]["orm"], "django");
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn test_template_cycle() {
    let err = project_from(
        r#"
        [envs.a]
        template = "b"
        [envs.b]
        template = "c"
        [envs.c]
        template = "a"
        "#,
    )
    .envs()
    .unwrap_err();
    assert!(err.to_string().contains("a -> b -> c -> a"), "{}", err);
}

#[test]
fn test_script_cycle() {
    let err = project_from("[scripts]\nx = 'y'\ny = 'x'")
        .scripts()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Cycle { .. }));
    assert!(err.to_string().contains("x -> y -> x"), "{}", err);
}

// =============================================================================
// Collectors and finalize
// =============================================================================

#[derive(Debug)]
struct Containers;

impl EnvironmentCollector for Containers {
    fn name(&self) -> &str {
        "containers"
    }

    fn initial_config(&self) -> envmatrix::Result<IndexMap<String, Table>> {
        let mut config = Table::new();
        config.insert("type".to_string(), Value::from("container"));
        Ok(IndexMap::from([("docker".to_string(), config)]))
    }

    fn finalize_environments(&self, envs: &mut IndexMap<String, Table>) -> envmatrix::Result<()> {
        for config in envs.values_mut() {
            if config.get("type").and_then(Value::as_str) == Some("container") {
                config
                    .entry("image".to_string())
                    .or_insert_with(|| Value::from("python:slim"));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RequiresDefault;

impl EnvironmentCollector for RequiresDefault {
    fn name(&self) -> &str {
        "requires-default"
    }

    fn finalize_config(&self, config: &mut IndexMap<String, Table>) -> envmatrix::Result<()> {
        let has_python = config
            .get("default")
            .is_some_and(|default| default.contains_key("python"));
        if has_python {
            Ok(())
        } else {
            Err(ConfigError::Collector {
                name: self.name().to_string(),
                message: "the `default` environment must pin `python`".to_string(),
            })
        }
    }
}

#[derive(Debug)]
struct Registry;

impl CollectorRegistry for Registry {
    fn collector(&self, name: &str, config: &Table) -> Option<Box<dyn EnvironmentCollector>> {
        match name {
            "containers" => Some(Box::new(Containers)),
            "requires-default" => Some(Box::new(RequiresDefault)),
            _ => BuiltinCollectors.collector(name, config),
        }
    }
}

#[test]
fn test_collector_seeds_and_finalizes_environments() {
    let mut project = project_from(
        r#"
        [env.collectors.containers]

        [envs.docker]
        python = "3.12"

        [envs.docker.overrides]
        platform.linux.volumes = ["/src:/src"]
        "#,
    )
    .with_collectors(Registry);

    let envs = project.envs().unwrap();
    // The user's keys are layered over the seeded `docker` environment.
    assert_eq!(envs["docker"]["type"].as_str(), Some("container"));
    assert_eq!(envs["docker"]["python"].as_str(), Some("3.12"));
    assert_eq!(envs["docker"]["image"].as_str(), Some("python:slim"));

    let mut seeded = project_from("[env.collectors.containers]").with_collectors(Registry);
    let envs = seeded.envs().unwrap();
    assert_eq!(envs["docker"]["type"].as_str(), Some("container"));
    assert_eq!(envs["docker"]["image"].as_str(), Some("python:slim"));
}

#[test]
fn test_unknown_collector_is_fatal() {
    let err = project_from("[env.collectors.containers]").envs().unwrap_err();
    assert_eq!(err.to_string(), "Unknown environment collector: containers");
}

#[test]
fn test_collector_hook_error_is_fatal() {
    let err = project_from("[env.collectors.requires-default]")
        .with_collectors(Registry)
        .envs()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Collector { .. }));
    assert_eq!(
        err.to_string(),
        "Environment collector `requires-default` failed: the `default` environment must pin `python`"
    );

    let mut pinned = project_from(
        r#"
        [env.collectors.requires-default]

        [envs.default]
        python = "3.12"
        "#,
    )
    .with_collectors(Registry);
    assert_eq!(pinned.envs().unwrap()["default"]["python"].as_str(), Some("3.12"));
}

#[test]
fn test_finalize_is_idempotent() {
    let mut project = project_from(
        r#"
        [envs.default]
        volumes = ["/a"]

        [envs.default.overrides]
        platform.linux.volumes = ["/b"]
        "#,
    );
    let types = HashMap::from([("volumes".to_string(), OptionKind::List)]);

    project.finalize_env_overrides(&types).unwrap();
    let once = project.envs().unwrap().clone();
    project.finalize_env_overrides(&types).unwrap();
    let twice = project.envs().unwrap().clone();

    assert_eq!(once["default"]["volumes"], Value::from(vec!["/a", "/b"]));
    assert_eq!(once, twice);
}

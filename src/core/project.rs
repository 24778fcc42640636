//! # Project Configuration
//!
//! [`ProjectConfig`] owns the raw `tool.hatch` table and computes the resolved
//! views on first access: the flat environment table, matrix metadata, and the
//! expanded scripts. Each view is computed once and kept.
//!
//! Environment resolution runs in this order:
//!
//! 1. Collectors seed environments and the user's `envs` table is layered on top.
//! 2. `finalize_config` hooks run, then templates are flattened.
//! 3. Per environment, `env` and then `platform` overrides are applied.
//! 4. Environments with a `matrix` are expanded, applying `matrix` and `name`
//!    overrides per combination.
//! 5. `finalize_environments` hooks run on the flat result.
//!
//! Overrides that applied are remembered per environment so that
//! [`ProjectConfig::finalize_env_overrides`] can replay them once an
//! environment plugin has declared the kinds of its own options.

use crate::{
    constants::{DEFAULT_ENV_NAME, DEFAULT_MATRIX_NAME_FORMAT, SCRIPTS_FIELD},
    core::{
        collectors::{self, BuiltinCollectors, CollectorRegistry},
        errors::{ConfigError, Result},
        matrix::{self, GeneratedEnvironment},
        overrides::{self, OverrideContext, OverrideRules},
        scripts, templates,
        value::{env_field, env_option_field, take_string},
    },
    models::{CachedOverride, CachedOverrides, MatrixData, OptionKind, OptionTypes, OverrideSource},
    system::host::Host,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use toml::{Table, Value};

/// Overrides that still have to be replayed against plugin option kinds.
#[derive(Debug, Clone, PartialEq)]
struct DeferredOverrides {
    /// The environment whose `overrides` table declared them.
    declared_in: String,
    overrides: CachedOverrides,
}

#[derive(Debug, Clone, Default)]
struct Resolution {
    envs: IndexMap<String, Table>,
    matrices: IndexMap<String, MatrixData>,
    deferred: IndexMap<String, DeferredOverrides>,
}

/// The configuration of one project and its lazily resolved views.
#[derive(Debug)]
pub struct ProjectConfig {
    config: Table,
    host: Host,
    registry: Box<dyn CollectorRegistry>,
    resolution: Option<Resolution>,
    scripts: Option<IndexMap<String, Vec<String>>>,
}

impl ProjectConfig {
    /// Wraps a raw `tool.hatch` table, evaluated against the running host.
    pub fn new(config: Table) -> Self {
        Self {
            config,
            host: Host::current(),
            registry: Box::new(BuiltinCollectors),
            resolution: None,
            scripts: None,
        }
    }

    /// Evaluates override conditions against `host` instead of the running process.
    pub fn with_host(mut self, host: Host) -> Self {
        self.host = host;
        self.resolution = None;
        self
    }

    /// Looks up environment collectors in `registry`.
    pub fn with_collectors(mut self, registry: impl CollectorRegistry + 'static) -> Self {
        self.registry = Box::new(registry);
        self.resolution = None;
        self
    }

    /// The raw table this configuration was built from.
    pub fn raw(&self) -> &Table {
        &self.config
    }

    /// The host that override conditions are evaluated against.
    pub fn host(&self) -> &Host {
        &self.host
    }

    // --- VIEWS ---

    /// All concrete environments by name. Matrix roots are replaced by the
    /// environments they generate.
    pub fn envs(&mut self) -> Result<&IndexMap<String, Table>> {
        Ok(&self.resolution()?.envs)
    }

    /// Metadata of every environment that declared a `matrix`, by root name.
    pub fn matrices(&mut self) -> Result<&IndexMap<String, MatrixData>> {
        Ok(&self.resolution()?.matrices)
    }

    /// The matrix variables of every generated environment, by generated name.
    pub fn matrix_variables(&mut self) -> Result<IndexMap<String, IndexMap<String, String>>> {
        Ok(self
            .matrices()?
            .values()
            .flat_map(|data| data.envs.iter())
            .map(|(name, variables)| (name.clone(), variables.clone()))
            .collect())
    }

    /// The project-level scripts with every reference expanded.
    pub fn scripts(&mut self) -> Result<&IndexMap<String, Vec<String>>> {
        let expanded = match self.scripts.take() {
            Some(expanded) => expanded,
            None => {
                let raw = self
                    .config
                    .get("scripts")
                    .cloned()
                    .unwrap_or_else(|| Value::Table(Table::new()));
                let parsed = scripts::parse_scripts(SCRIPTS_FIELD, &raw)?;
                scripts::expand_scripts(SCRIPTS_FIELD, &parsed)?
            }
        };
        Ok(self.scripts.insert(expanded))
    }

    /// The `scripts` of one resolved environment with every reference expanded.
    pub fn expand_env_scripts(&mut self, env_name: &str) -> Result<IndexMap<String, Vec<String>>> {
        let env = self.envs()?.get(env_name).ok_or_else(|| {
            ConfigError::value_error(format!("Unknown environment `{}`", env_name))
        })?;
        let Some(raw) = env.get("scripts") else {
            return Ok(IndexMap::new());
        };
        let field = env_option_field(env_name, "scripts");
        let parsed = scripts::parse_scripts(&field, raw)?;
        scripts::expand_scripts(&field, &parsed)
    }

    // --- FINALIZE ---

    /// Replays the remembered overrides for options declared by an environment plugin.
    ///
    /// Built-in options are not touched again. The replay works on a copy of
    /// the environments that replaces them only when every environment
    /// succeeded; on error nothing changes and the call can be retried. Once
    /// the replay succeeds the remembered overrides are dropped, so later calls
    /// do nothing.
    pub fn finalize_env_overrides(&mut self, option_types: &HashMap<String, OptionKind>) -> Result<()> {
        let host = self.host.clone();
        let Resolution { envs, deferred, .. } = self.resolution_mut()?;
        if deferred.is_empty() {
            return Ok(());
        }

        let option_types = OptionTypes::Plugin(option_types);
        let mut finalized = envs.clone();
        for (env_name, pending) in deferred.iter() {
            let Some(config) = finalized.get_mut(env_name) else {
                log::warn!("Environment '{}' disappeared before finalization.", env_name);
                continue;
            };
            for source in OverrideSource::PRECEDENCE {
                for entry in pending.overrides.get(source) {
                    let ctx = OverrideContext {
                        env_name: &pending.declared_in,
                        source,
                        condition: &entry.condition,
                        condition_value: &entry.condition_value,
                        host: &host,
                    };
                    overrides::apply_overrides(&ctx, &entry.options, config, option_types)?;
                }
            }
        }

        log::debug!("Finalized overrides for {} environment(s).", deferred.len());
        *envs = finalized;
        deferred.clear();
        Ok(())
    }

    // --- RESOLUTION ---

    fn resolution(&mut self) -> Result<&Resolution> {
        self.resolution_mut().map(|resolution| &*resolution)
    }

    fn resolution_mut(&mut self) -> Result<&mut Resolution> {
        let resolution = match self.resolution.take() {
            Some(resolution) => resolution,
            None => self.resolve()?,
        };
        Ok(self.resolution.insert(resolution))
    }

    fn resolve(&self) -> Result<Resolution> {
        let configs = collectors::collector_configs(self.config.get("env"))?;
        let collectors = collectors::load_collectors(self.registry.as_ref(), &configs)?;

        let mut raw_envs = collectors::seed_environments(&collectors, self.config.get("envs"))?;
        for collector in &collectors {
            collector.finalize_config(&mut raw_envs)?;
        }
        if !raw_envs.contains_key(DEFAULT_ENV_NAME) {
            raw_envs.shift_insert(0, DEFAULT_ENV_NAME.to_string(), Table::new());
        }
        templates::resolve_templates(&mut raw_envs)?;

        let mut resolution = Resolution::default();
        for (env_name, config) in raw_envs {
            self.resolve_environment(&env_name, config, &mut resolution)?;
        }

        for collector in &collectors {
            collector.finalize_environments(&mut resolution.envs)?;
        }

        log::debug!(
            "Resolved {} environment(s) from {} matrix root(s).",
            resolution.envs.len(),
            resolution.matrices.len()
        );
        Ok(resolution)
    }

    fn resolve_environment(
        &self,
        env_name: &str,
        mut config: Table,
        resolution: &mut Resolution,
    ) -> Result<()> {
        let rules = OverrideRules::take_from(env_name, &mut config)?;
        let name_format = take_string(
            &mut config,
            "matrix-name-format",
            &env_option_field(env_name, "matrix-name-format"),
        )?
        .unwrap_or_else(|| DEFAULT_MATRIX_NAME_FORMAT.to_string());
        let matrix = config.remove("matrix");

        let mut applied = CachedOverrides::default();
        self.apply_host_overrides(env_name, &rules, &mut config, &mut applied)?;

        let Some(matrix) = matrix else {
            return insert_environment(
                resolution,
                env_name,
                env_name,
                GeneratedEnvironment {
                    config,
                    overrides: applied,
                },
            );
        };

        let axis_maps = matrix::parse_matrix_series(env_name, &matrix)?;
        let expansion = matrix::expand_matrix(
            env_name,
            &config,
            &axis_maps,
            &rules,
            &name_format,
            &applied,
            &self.host,
        )?;
        for (name, generated) in expansion.environments {
            insert_environment(resolution, env_name, &name, generated)?;
        }
        resolution.matrices.insert(env_name.to_string(), expansion.data);
        Ok(())
    }

    /// Applies the `env` overrides whose variable is set, then the `platform`
    /// overrides for the current platform.
    fn apply_host_overrides(
        &self,
        env_name: &str,
        rules: &OverrideRules,
        config: &mut Table,
        applied: &mut CachedOverrides,
    ) -> Result<()> {
        for source in [OverrideSource::Env, OverrideSource::Platform] {
            for (condition, options) in rules.get(source) {
                let condition_value = match source {
                    OverrideSource::Env => self.host.env_var(condition),
                    _ => Some(self.host.platform()).filter(|platform| *platform == condition.as_str()),
                };
                let Some(condition_value) = condition_value else {
                    continue;
                };

                log::trace!(
                    "Applying {} override '{}' to environment '{}'.",
                    source,
                    condition,
                    env_name
                );
                let ctx = OverrideContext {
                    env_name,
                    source,
                    condition,
                    condition_value,
                    host: &self.host,
                };
                overrides::apply_overrides(&ctx, options, config, OptionTypes::Reserved)?;
                applied.push(
                    source,
                    CachedOverride {
                        condition: condition.clone(),
                        condition_value: condition_value.to_string(),
                        options: options.clone(),
                    },
                );
            }
        }
        Ok(())
    }
}

fn insert_environment(
    resolution: &mut Resolution,
    declared_in: &str,
    name: &str,
    generated: GeneratedEnvironment,
) -> Result<()> {
    if resolution.envs.contains_key(name) {
        return Err(ConfigError::value_error(format!(
            "Environment `{}` from field `{}` conflicts with an existing environment of the same name",
            name,
            env_field(declared_in)
        )));
    }
    if !generated.overrides.is_empty() {
        resolution.deferred.insert(
            name.to_string(),
            DeferredOverrides {
                declared_in: declared_in.to_string(),
                overrides: generated.overrides,
            },
        );
    }
    resolution.envs.insert(name.to_string(), generated.config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn project(source: &str) -> ProjectConfig {
        ProjectConfig::new(toml::from_str(source).unwrap()).with_host(Host::new("linux"))
    }

    fn env_names(project: &mut ProjectConfig) -> Vec<String> {
        project.envs().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_default_environment_always_exists() {
        let mut project = project("");
        assert_eq!(env_names(&mut project), vec!["default"]);
        assert_eq!(
            project.envs().unwrap()["default"]["type"].as_str(),
            Some("virtual")
        );
    }

    #[test]
    fn test_matrix_root_is_replaced_by_generated_environments() {
        let mut project = project(
            r#"
            [envs.default]
            dependencies = ["pytest"]

            [envs.test]
            matrix = [{ python = ["3.11", "3.12"] }]
            "#,
        );
        assert_eq!(
            env_names(&mut project),
            vec!["default", "test.py3.11", "test.py3.12"]
        );
        let env = &project.envs().unwrap()["test.py3.12"];
        assert_eq!(env["dependencies"], Value::from(vec!["pytest"]));
        assert_eq!(env["python"].as_str(), Some("3.12"));

        let matrices = project.matrices().unwrap();
        assert_eq!(matrices.keys().collect::<Vec<_>>(), vec!["test"]);
        assert!(!matrices["test"].config.contains_key("matrix"));
    }

    #[test]
    fn test_matrix_variables() {
        let mut project = project(
            r#"
            [envs.test]
            matrix = [{ db = ["pg"], py = ["3.12"] }]
            "#,
        );
        let variables = project.matrix_variables().unwrap();
        assert_eq!(variables.keys().collect::<Vec<_>>(), vec!["test.py3.12-pg"]);
        assert_eq!(variables["test.py3.12-pg"]["db"], "pg");
    }

    #[test]
    fn test_env_and_platform_overrides() {
        let mut project = ProjectConfig::new(
            toml::from_str(
                r#"
                [envs.default]
                dependencies = ["base"]

                [envs.default.overrides]
                env.CI.dependencies = ["ci-tools"]
                env.MISSING.dependencies = ["never"]
                platform.linux.dependencies = ["linux-tools"]
                platform.windows.dependencies = ["windows-tools"]
                "#,
            )
            .unwrap(),
        )
        .with_host(Host::new("linux").with_env_var("CI", "1"));

        let env = &project.envs().unwrap()["default"];
        assert_eq!(
            env["dependencies"],
            Value::from(vec!["base", "ci-tools", "linux-tools"])
        );
        assert!(!env.contains_key("overrides"));
    }

    #[test]
    fn test_matrix_overrides_beat_platform_overrides() {
        let mut project = project(
            r#"
            [envs.test]
            matrix = [{ db = ["pg"] }]

            [envs.test.overrides]
            platform.linux.description = "platform"
            matrix.db.description = "matrix"
            "#,
        );
        assert_eq!(
            project.envs().unwrap()["test.pg"]["description"].as_str(),
            Some("matrix")
        );
    }

    #[test]
    fn test_generated_name_collision() {
        let mut project = project(
            r#"
            [envs."py3.12"]
            [envs.default]
            matrix = [{ python = ["3.12"] }]
            "#,
        );
        let err = project.envs().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment `py3.12` from field `tool.hatch.envs.py3.12` conflicts with an existing environment of the same name"
        );
    }

    #[test]
    fn test_finalize_applies_plugin_options_once() {
        let mut project = project(
            r#"
            [envs.default.overrides]
            platform.linux.mounts = ["/data"]
            platform.linux.dependencies = ["x"]
            "#,
        );
        assert!(!project.envs().unwrap()["default"].contains_key("mounts"));

        let types = HashMap::from([("mounts".to_string(), OptionKind::List)]);
        project.finalize_env_overrides(&types).unwrap();
        project.finalize_env_overrides(&types).unwrap();

        let env = &project.envs().unwrap()["default"];
        assert_eq!(env["mounts"], Value::from(vec!["/data"]));
        assert_eq!(env["dependencies"], Value::from(vec!["x"]));
    }

    #[test]
    fn test_finalize_rejects_untyped_plugin_option() {
        let mut project = project(
            r#"
            [envs.default.overrides]
            platform.linux.mounts = ["/data"]
            "#,
        );
        let err = project.finalize_env_overrides(&HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Conflict { .. }));
    }

    #[test]
    fn test_failed_finalize_leaves_environments_untouched() {
        let mut project = project(
            r#"
            [envs.a.overrides]
            platform.linux.mounts = ["/data"]

            [envs.b.overrides]
            platform.linux.other = ["x"]
            "#,
        );
        let before = project.envs().unwrap().clone();

        let mounts_only = HashMap::from([("mounts".to_string(), OptionKind::List)]);
        let err = project.finalize_env_overrides(&mounts_only).unwrap_err();
        assert!(matches!(err, ConfigError::Conflict { .. }));
        assert_eq!(project.envs().unwrap(), &before);

        let both = HashMap::from([
            ("mounts".to_string(), OptionKind::List),
            ("other".to_string(), OptionKind::List),
        ]);
        project.finalize_env_overrides(&both).unwrap();
        let envs = project.envs().unwrap();
        assert_eq!(envs["a"]["mounts"], Value::from(vec!["/data"]));
        assert_eq!(envs["b"]["other"], Value::from(vec!["x"]));
    }

    #[test]
    fn test_finalize_replays_matrix_after_platform() {
        let mut project = project(
            r#"
            [envs.test]
            matrix = [{ db = ["pg"] }]

            [envs.test.overrides]
            platform.linux.image = "from-platform"
            matrix.db.image = "from-matrix"
            "#,
        );
        assert!(!project.envs().unwrap()["test.pg"].contains_key("image"));

        let types = HashMap::from([("image".to_string(), OptionKind::Text)]);
        project.finalize_env_overrides(&types).unwrap();

        assert_eq!(
            project.envs().unwrap()["test.pg"]["image"].as_str(),
            Some("from-matrix")
        );
    }

    #[test]
    fn test_project_scripts() {
        let mut project = project(
            r#"
            [scripts]
            check = ["lint", "test --cov"]
            lint = "ruff check"
            test = "pytest"
            "#,
        );
        assert_eq!(
            project.scripts().unwrap()["check"],
            vec!["ruff check", "pytest --cov"]
        );
    }

    #[test]
    fn test_env_scripts_are_inherited_and_expanded() {
        let mut project = project(
            r#"
            [envs.default.scripts]
            test = "pytest"

            [envs.cov.scripts]
            run = ["- test --cov", "coverage report"]
            "#,
        );
        let scripts = project.expand_env_scripts("cov").unwrap();
        assert_eq!(scripts["run"], vec!["- pytest --cov", "coverage report"]);
        assert_eq!(scripts["test"], vec!["pytest"]);

        let err = project.expand_env_scripts("missing").unwrap_err();
        assert_eq!(err.to_string(), "Unknown environment `missing`");
    }
}

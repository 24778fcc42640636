//! # Environment Collectors
//!
//! Collectors contribute environments from outside the user's table and get a
//! chance to adjust the configuration before and after resolution.
//!
//! How collectors are discovered is up to the embedding application. It hands
//! the resolver a [`CollectorRegistry`]; the resolver asks it for every
//! collector named under `tool.hatch.env.collectors`, plus `default`, which is
//! always enabled.

use crate::{
    constants::{DEFAULT_COLLECTOR, DEFAULT_ENV_NAME, ENV_FIELD, ENVS_FIELD},
    core::{
        errors::{ConfigError, Result},
        value,
    },
};
use indexmap::IndexMap;
use std::fmt;
use toml::{Table, Value};

/// A source of environments and a set of hooks around resolution.
pub trait EnvironmentCollector: fmt::Debug {
    /// The name the collector is enabled under.
    fn name(&self) -> &str;

    /// Environments to seed. The user's table is layered on top of them.
    fn initial_config(&self) -> Result<IndexMap<String, Table>> {
        Ok(IndexMap::new())
    }

    /// Runs on the raw environment table, before template resolution.
    fn finalize_config(&self, _config: &mut IndexMap<String, Table>) -> Result<()> {
        Ok(())
    }

    /// Runs on the fully resolved environments, after matrix expansion.
    fn finalize_environments(&self, _envs: &mut IndexMap<String, Table>) -> Result<()> {
        Ok(())
    }
}

/// Hands out collectors by name.
pub trait CollectorRegistry: fmt::Debug {
    /// Builds the collector registered as `name` with its settings, if there is one.
    fn collector(&self, name: &str, config: &Table) -> Option<Box<dyn EnvironmentCollector>>;
}

/// The collector that guarantees a `default` environment exists.
#[derive(Debug, Clone, Default)]
pub struct DefaultCollector;

impl EnvironmentCollector for DefaultCollector {
    fn name(&self) -> &str {
        DEFAULT_COLLECTOR
    }

    fn initial_config(&self) -> Result<IndexMap<String, Table>> {
        Ok(IndexMap::from([(DEFAULT_ENV_NAME.to_string(), Table::new())]))
    }
}

/// A registry that only knows the built-in collectors.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCollectors;

impl CollectorRegistry for BuiltinCollectors {
    fn collector(&self, name: &str, _config: &Table) -> Option<Box<dyn EnvironmentCollector>> {
        match name {
            DEFAULT_COLLECTOR => Some(Box::new(DefaultCollector)),
            _ => None,
        }
    }
}

/// Reads `tool.hatch.env.collectors`, with the `default` collector first.
pub fn collector_configs(env_settings: Option<&Value>) -> Result<IndexMap<String, Table>> {
    let mut configs = IndexMap::from([(DEFAULT_COLLECTOR.to_string(), Table::new())]);

    let Some(env_settings) = env_settings else {
        return Ok(configs);
    };
    let env_settings = value::expect_table(env_settings, ENV_FIELD)?;
    let Some(collectors) = env_settings.get("collectors") else {
        return Ok(configs);
    };

    let field = format!("{}.collectors", ENV_FIELD);
    for (name, config) in value::expect_table(collectors, &field)? {
        let config = value::expect_table(config, &format!("{}.{}", field, name))?;
        configs.insert(name.clone(), config.clone());
    }
    Ok(configs)
}

/// Instantiates every configured collector through `registry`.
pub fn load_collectors(
    registry: &dyn CollectorRegistry,
    configs: &IndexMap<String, Table>,
) -> Result<Vec<Box<dyn EnvironmentCollector>>> {
    configs
        .iter()
        .map(|(name, config)| {
            log::debug!("Loading environment collector '{}'.", name);
            registry
                .collector(name, config)
                .ok_or_else(|| ConfigError::UnknownCollector { name: name.clone() })
        })
        .collect()
}

/// Merges the collectors' seed environments under the user's `envs` table.
///
/// Seeds from earlier collectors win over later ones. The keys of a user
/// environment overwrite those of the seeded environment of the same name;
/// the seed's other keys are kept.
pub fn seed_environments(
    collectors: &[Box<dyn EnvironmentCollector>],
    user_envs: Option<&Value>,
) -> Result<IndexMap<String, Table>> {
    let mut envs = IndexMap::new();
    for collector in collectors {
        for (env_name, config) in collector.initial_config()? {
            if !envs.contains_key(&env_name) {
                log::trace!(
                    "Collector '{}' seeds environment '{}'.",
                    collector.name(),
                    env_name
                );
                envs.insert(env_name, config);
            }
        }
    }

    if let Some(user_envs) = user_envs {
        let user_envs = value::expect_table(user_envs, ENVS_FIELD)?;
        for (env_name, config) in user_envs {
            let config = value::expect_table(config, &value::env_field(env_name))?;
            let seeded = envs.entry(env_name.clone()).or_default();
            for (option, data) in config {
                seeded.insert(option.clone(), data.clone());
            }
        }
    }
    Ok(envs)
}

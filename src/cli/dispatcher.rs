// src/cli/dispatcher.rs

use anyhow::{Result, anyhow};

use crate::{
    cli::{Cli, handlers},
    core::project::ProjectConfig,
};

// --- Command Definition and Registry ---

/// Defines an action, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &mut ProjectConfig) -> Result<()>,
}

static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "envs",
        aliases: &["ls"],
        handler: handlers::envs::handle,
    },
    CommandDefinition {
        name: "matrices",
        aliases: &["matrix"],
        handler: handlers::matrices::handle,
    },
    CommandDefinition {
        name: "scripts",
        aliases: &[],
        handler: handlers::scripts::handle,
    },
    CommandDefinition {
        name: "show",
        aliases: &["env"],
        handler: handlers::show::handle,
    },
];

const DEFAULT_ACTION: &str = "envs";

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Loads the project named by `cli` and runs the requested action on it.
pub fn dispatch(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let action = cli.action.as_deref().unwrap_or(DEFAULT_ACTION);
    let command = find_command(action).ok_or_else(|| {
        let known: Vec<&str> = COMMAND_REGISTRY.iter().map(|cmd| cmd.name).collect();
        anyhow!(
            "Unknown action '{}'. Expected one of: {}",
            action,
            known.join(", ")
        )
    })?;

    let mut project = handlers::commons::load_project(&cli)?;
    (command.handler)(cli.args, &mut project)
}

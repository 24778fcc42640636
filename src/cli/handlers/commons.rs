// src/cli/handlers/commons.rs

// Shared helpers for the action handlers.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use serde::Serialize;

use crate::{
    cli::Cli,
    core::{config_loader, project::ProjectConfig},
    system::host::Host,
};

/// Reads the project at `cli.root` and applies the host flags.
pub fn load_project(cli: &Cli) -> Result<ProjectConfig> {
    let raw = config_loader::load_project(&cli.root)
        .with_context(|| format!("Failed to load project at '{}'", cli.root.display()))?;
    Ok(ProjectConfig::new(raw).with_host(host_from_flags(cli)?))
}

fn host_from_flags(cli: &Cli) -> Result<Host> {
    let mut host = Host::current();
    if let Some(platform) = &cli.platform {
        host = host.with_platform(platform);
    }
    for pair in &cli.env_vars {
        let (name, value) = parse_env_var(pair)?;
        host = host.with_env_var(name, value);
    }
    Ok(host)
}

/// Parses a `KEY=VALUE` flag. A bare `KEY` sets an empty value.
pub fn parse_env_var(pair: &str) -> Result<(&str, &str)> {
    let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
    if name.is_empty() {
        return Err(anyhow!("Invalid environment variable '{}': expected KEY=VALUE", pair));
    }
    Ok((name, value))
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a section header in the style shared by all listings.
pub fn print_header(title: &str) {
    println!("\n--- {} ---", title.yellow());
}

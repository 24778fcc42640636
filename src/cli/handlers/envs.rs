// src/cli/handlers/envs.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::{args::EnvsArgs, handlers::commons},
    core::project::ProjectConfig,
};

/// Lists resolved environments with their type and Python version.
pub fn handle(args: Vec<String>, project: &mut ProjectConfig) -> Result<()> {
    let envs_args = EnvsArgs::try_parse_from(&args)?;
    let envs = project.envs()?;

    if envs_args.json {
        return commons::print_json(envs);
    }

    commons::print_header("Environments");
    for (name, config) in envs {
        let env_type = config.get("type").and_then(|v| v.as_str()).unwrap_or("-");
        let python = config.get("python").and_then(|v| v.as_str()).unwrap_or("");
        let description = config
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        println!(
            "  {:<30} {:<10} {:<8} {}",
            name.cyan().bold(),
            env_type,
            python,
            description.dimmed()
        );
    }
    Ok(())
}

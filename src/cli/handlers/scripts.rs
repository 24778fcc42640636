// src/cli/handlers/scripts.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::{args::ScriptsArgs, handlers::commons},
    core::project::ProjectConfig,
};

/// Lists project scripts, or the scripts of one environment with `--env`.
pub fn handle(args: Vec<String>, project: &mut ProjectConfig) -> Result<()> {
    let scripts_args = ScriptsArgs::try_parse_from(&args)?;

    let (title, scripts) = match &scripts_args.env {
        Some(env_name) => (
            format!("Scripts of '{}'", env_name),
            project.expand_env_scripts(env_name)?,
        ),
        None => ("Project scripts".to_string(), project.scripts()?.clone()),
    };

    if scripts_args.json {
        return commons::print_json(&scripts);
    }

    commons::print_header(&title);
    for (name, commands) in &scripts {
        println!("  {}", name.cyan().bold());
        for command in commands {
            println!("    {}", command);
        }
    }
    Ok(())
}

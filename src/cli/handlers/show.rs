// src/cli/handlers/show.rs

use anyhow::{Result, anyhow};
use clap::Parser;

use crate::{
    cli::{args::ShowArgs, handlers::commons},
    core::project::ProjectConfig,
};

/// Prints one resolved environment as TOML or JSON.
pub fn handle(args: Vec<String>, project: &mut ProjectConfig) -> Result<()> {
    let show_args = ShowArgs::try_parse_from(&args)?;
    let config = project
        .envs()?
        .get(&show_args.name)
        .ok_or_else(|| anyhow!("Environment '{}' not found.", show_args.name))?;

    if show_args.json {
        return commons::print_json(config);
    }

    commons::print_header(&show_args.name);
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

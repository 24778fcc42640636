// src/cli/handlers/matrices.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use itertools::Itertools;

use crate::{
    cli::{args::MatricesArgs, handlers::commons},
    core::project::ProjectConfig,
};

/// Lists every matrix root with the environments it generated.
pub fn handle(args: Vec<String>, project: &mut ProjectConfig) -> Result<()> {
    let matrices_args = MatricesArgs::try_parse_from(&args)?;
    let matrices = project.matrices()?;

    if matrices_args.json {
        return commons::print_json(matrices);
    }

    if matrices.is_empty() {
        println!("No environment declares a matrix.");
        return Ok(());
    }

    for (root, data) in matrices {
        commons::print_header(root);
        for (name, variables) in &data.envs {
            let summary = variables
                .iter()
                .map(|(variable, value)| format!("{}={}", variable, value))
                .join(", ");
            println!("  {:<30} {}", name.cyan(), summary.dimmed());
        }
    }
    Ok(())
}

// src/bin/envmatrix.rs

use clap::Parser;
use colored::*;
use envmatrix::cli::{Cli, dispatcher};

/// Sets up logging, parses arguments, and reports any error in one place.
fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if let Err(e) = dispatcher::dispatch(cli) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

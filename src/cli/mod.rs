// src/cli/mod.rs

use clap::Parser;
use std::path::PathBuf;

pub mod args;
pub mod dispatcher;
pub mod handlers;

/// envmatrix: resolves a project's environment tables into concrete environments.
///
/// Usage: `envmatrix [OPTIONS] [ACTION] [ARGS...]`
///
/// Actions:
/// - `envs` (`ls`): list resolved environments (default)
/// - `matrices`: list matrix roots and what they generate
/// - `scripts`: list expanded project or environment scripts
/// - `show <env>`: print one resolved environment
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The project root holding `pyproject.toml` and/or `hatch.toml`.
    #[arg(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Evaluate `platform` overrides as if running on this platform.
    #[arg(long)]
    pub platform: Option<String>,

    /// Set an environment variable seen by `env` overrides (e.g., "CI=true").
    #[arg(long = "env-var", value_name = "KEY=VALUE")]
    pub env_vars: Vec<String>,

    /// Log resolution steps at debug level.
    #[arg(long, short)]
    pub verbose: bool,

    /// The action to run. Defaults to `envs`.
    pub action: Option<String>,

    /// All remaining arguments, passed to the action.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

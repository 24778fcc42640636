// src/cli/args.rs
use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists the resolved environments.")]
pub struct EnvsArgs {
    /// Print the full resolved table as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists every matrix root and the environments it generates."
)]
pub struct MatricesArgs {
    /// Print the matrix metadata as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists scripts with every alias expanded.")]
pub struct ScriptsArgs {
    /// Show the scripts of this environment instead of the project scripts.
    #[arg(long, short)]
    pub env: Option<String>,

    /// Print the scripts as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Prints one resolved environment.")]
pub struct ShowArgs {
    /// The environment name, e.g. `test.py3.12`.
    pub name: String,

    /// Print as JSON instead of TOML.
    #[arg(long)]
    pub json: bool,
}

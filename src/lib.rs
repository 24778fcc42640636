//! Resolves declarative project environment configuration into concrete
//! environments and expanded script aliases.
//!
//! The entry point is [`ProjectConfig`], built from the raw `tool.hatch` table
//! that [`core::config_loader::load_project`] reads from disk.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;

pub use crate::core::errors::{ConfigError, Result};
pub use crate::core::project::ProjectConfig;
pub use crate::system::host::Host;

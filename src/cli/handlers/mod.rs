// src/cli/handlers/mod.rs

// One module per CLI action.

pub mod commons;
pub mod envs;
pub mod matrices;
pub mod scripts;
pub mod show;

// src/core/mod.rs

pub mod collectors;
pub mod config_loader;
pub mod errors;
pub mod matrix;
pub mod overrides;
pub mod project;
pub mod scripts;
pub mod templates;
pub mod value;

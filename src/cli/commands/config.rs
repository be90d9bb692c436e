//! Config Command
//!
//! Usage:
//!   topicpulse config show [-f json]
//!   topicpulse config path
//!   topicpulse config init [-g] [--force]

use std::path::Path;

use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration (secrets are never printed)
pub fn show(config_path: Option<&Path>, format: &str) -> Result<()> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_with_file(path)?,
        None => ConfigLoader::load()?,
    };
    println!("{}", ConfigLoader::render(&config, format == "json")?);
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };
    println!(
        "✓ Initialized {} configuration",
        if global { "global" } else { "project" }
    );
    println!("  Config: {}", path.display());
    Ok(())
}

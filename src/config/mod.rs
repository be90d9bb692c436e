//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/topicpulse/config.toml)
//! 3. Project config (.topicpulse/config.toml)
//! 4. Environment variables (TOPICPULSE_*, `__` between sections)
//! 5. CLI arguments (highest priority)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;

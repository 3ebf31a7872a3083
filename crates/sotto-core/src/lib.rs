//! Core types and configuration for sotto.
//!
//! This crate provides platform-agnostic types that can be used across
//! all sotto sub-crates.

mod config;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};

pub use config::{CloseBehavior, Config, ConfigManager};
pub use state::MicState;

/// Application name
pub const APP_NAME: &str = "sotto";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Sotto";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Returns the directory where model files are stored.
pub fn models_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Failed to retrieve data directory")?;
    Ok(data_dir.join(APP_NAME).join("models"))
}

//! Unified path management for casewise files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/casewise/          # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/casewise/     # Data directory
//! └── sessions/                # One <session_id>.json per session
//! ```

use casewise_core::{CasewiseError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "casewise";

pub struct CasewisePaths;

impl CasewisePaths {
    /// Returns the configuration directory (e.g. `~/.config/casewise/`).
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| CasewiseError::config("Cannot find config directory"))
    }

    /// Returns the data directory (e.g. `~/.local/share/casewise/`).
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| CasewiseError::config("Cannot find data directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn sessions_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("sessions"))
    }
}

//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! Everything lives under ~/.contract-sentinel/.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Application directory name under the home directory
const APP_DIR: &str = ".contract-sentinel";

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the application directory (~/.contract-sentinel/)
pub fn sentinel_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(APP_DIR))
}

/// Get the config file path (~/.contract-sentinel/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(sentinel_dir()?.join("config.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensure the parent directory of `file` exists
pub fn ensure_parent_dir(file: &Path) -> AppResult<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

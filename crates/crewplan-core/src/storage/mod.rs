mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, LoggingConfig};
pub use database::AllocationDb;

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it when missing.
///
/// `CREWPLAN_HOME` wins when set. Otherwise `~/.config/crewplan`, or
/// `~/.config/crewplan-dev` with `CREWPLAN_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("CREWPLAN_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("CREWPLAN_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("crewplan-dev")
            } else {
                base_dir.join("crewplan")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

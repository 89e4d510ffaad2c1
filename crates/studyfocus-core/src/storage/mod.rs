mod config;
pub mod database;
mod gateway;
mod snapshot;

pub use config::{Config, NotificationsConfig, EDITABLE_RANGES};
pub use database::SqliteGateway;
pub use gateway::{BackgroundGateway, MemoryGateway, PersistenceGateway};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};

use std::path::PathBuf;

/// Returns `~/.config/studyfocus[-dev]/` based on STUDYFOCUS_ENV.
///
/// Set STUDYFOCUS_ENV=dev to use the development data directory, or
/// STUDYFOCUS_HOME to use an explicit directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("STUDYFOCUS_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STUDYFOCUS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studyfocus-dev")
            } else {
                base_dir.join("studyfocus")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

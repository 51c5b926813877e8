use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::reveal::DEFAULT_REVEAL_DELAY;

pub const DEFAULT_MODEL: &str = "claude-sonnet";

/// Runtime settings, read from the environment (and `.env` if present).
/// Provider API keys are read by the providers themselves.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub data_dir: PathBuf,
    pub reveal_delay: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let reveal_delay = match std::env::var("SCOUT_REVEAL_DELAY_MS") {
            Ok(ms) => Duration::from_millis(
                ms.trim()
                    .parse::<u64>()
                    .context("SCOUT_REVEAL_DELAY_MS must be a whole number of milliseconds")?,
            ),
            Err(_) => DEFAULT_REVEAL_DELAY,
        };

        let data_dir = match std::env::var("SCOUT_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_data_dir(),
        };

        Ok(Config {
            model: std::env::var("SCOUT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            data_dir,
            reveal_delay,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("scout.log")
    }
}

fn default_data_dir() -> PathBuf {
    // Use XDG data directory or fallback
    match directories::ProjectDirs::from("", "", "scout") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_reads_overrides() {
        unsafe {
            std::env::set_var("SCOUT_REVEAL_DELAY_MS", "25");
            std::env::set_var("SCOUT_DATA_DIR", "/tmp/scout-test");
            std::env::set_var("SCOUT_MODEL", "api-haiku");
        }

        let config = Config::from_env();

        unsafe {
            std::env::remove_var("SCOUT_REVEAL_DELAY_MS");
            std::env::remove_var("SCOUT_DATA_DIR");
            std::env::remove_var("SCOUT_MODEL");
        }

        let config = config.unwrap();
        assert_eq!(config.reveal_delay, Duration::from_millis(25));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/scout-test"));
        assert_eq!(config.model, "api-haiku");
        assert_eq!(config.log_path(), PathBuf::from("/tmp/scout-test/scout.log"));
    }
}

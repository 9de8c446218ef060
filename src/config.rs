//! Configuration and settings management
//!
//! Loads settings from environment variables and defines bot constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default, alias = "telegram_token")]
    pub bot_token: String,

    /// Telegram ID of the privileged requester (0 disables owner-only actions)
    #[serde(default)]
    pub owner_id: i64,

    /// Directory holding per-requester session blobs
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,

    /// Root directory for per-request staging folders
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Number of worker threads serving blocking platform calls
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,

    /// Upper bound for a single platform operation, unbounded when unset
    pub fetch_timeout_secs: Option<u64>,

    /// Overrides the HTTP user agent used against the platform
    pub user_agent: Option<String>,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

const fn default_fetch_workers() -> usize {
    4
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use igfetch_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__FETCH_WORKERS=8 ./target/igfetch-bot`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case,
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the credentials the process cannot start without.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` when the bot token is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "BOT_TOKEN is required (env var)".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if `user_id` is the configured privileged requester
    #[must_use]
    pub const fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id != 0 && self.owner_id == user_id
    }

    /// Worker pool size, never below one
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.fetch_workers.max(1)
    }

    /// Optional per-operation timeout
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

/// File extensions delivered from a staging folder (lowercase, without dot)
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "mp4", "webp", "mov"];

/// Maximum message length for Telegram with safety margin.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

// Telegram API retry policy
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff between Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum attempts for a Telegram API operation
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

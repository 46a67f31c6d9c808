//! Configuration file support for archivist.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. Environment variables (prefixed with `ARCHIVIST_`, e.g., `ARCHIVIST_DATABASE_URL`)
//! 2. The file passed with `--config` (TOML or JSON, chosen by extension)
//! 3. The platform config file (~/.config/archivist/config.toml on Linux)
//! 4. Built-in defaults
//!
//! A `.env` file in the working directory is read into the environment before any
//! of the above.
//!
//! The database URL defaults to `sqlite://~/.local/state/archivist/archive.db` on
//! Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! database_url = "postgres://archivist@localhost/archive"  # optional
//! page_size = 100
//! timeout_secs = 30
//! global_rps = 50
//!
//! [[accounts]]
//! name = "main"
//! token = "..."
//! user_agent = "Mozilla/5.0 ..."
//! guilds = ["81384788765712384", 613425648685547541]
//! ```

use std::path::{Path, PathBuf};

use archivist::Snowflake;
use archivist::api::rate_limits::DISCORD_GLOBAL_RPS;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

const APP_NAME: &str = "archivist";

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported config file extension: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),

    #[error("could not determine a default database location; set database_url")]
    NoDatabaseUrl,
}

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub database_url: Option<String>,
    /// Messages requested per page (1..=100).
    pub page_size: u8,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Proactive per-credential request rate. `0` disables it.
    pub global_rps: u32,
    /// Whether threads are archived alongside their parents.
    pub include_threads: bool,
    /// Credentials and the guilds each one archives.
    pub accounts: Vec<AccountConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            page_size: 100,
            timeout_secs: 30,
            global_rps: DISCORD_GLOBAL_RPS,
            include_threads: true,
            accounts: Vec::new(),
        }
    }
}

/// One configured credential.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Guild ids, as numbers or strings.
    #[serde(default)]
    pub guilds: Vec<Snowflake>,
}

fn default_user_agent() -> String {
    format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. Platform config file (~/.config/archivist/config.toml)
    /// 3. The explicit `path`, which must exist
    /// 4. Environment variables with the ARCHIVIST_ prefix
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(default_path) = Self::default_config_path()
            && default_path.exists()
        {
            tracing::debug!(path = %default_path.display(), "Loading config file");
            builder = builder.add_source(
                File::from(default_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            tracing::debug!(path = %path.display(), "Loading config file");
            builder = builder.add_source(File::from(path).format(file_format(path)?));
        }

        // ARCHIVIST_DATABASE_URL -> database_url, ARCHIVIST_ACCOUNTS__0__TOKEN -> accounts[0].token
        builder = builder.add_source(
            Environment::with_prefix("ARCHIVIST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter enables read-write access and creates the file if
    /// it doesn't exist.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.database_url {
            return Ok(url.clone());
        }
        Self::default_state_dir()
            .map(|state_dir| {
                let db_path = state_dir.join("archive.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
            .ok_or(ConfigError::NoDatabaseUrl)
    }

    /// Proactive rate for each credential, `None` when disabled.
    pub fn global_rps(&self) -> Option<u32> {
        (self.global_rps > 0).then_some(self.global_rps)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/archivist` or `~/.local/state/archivist`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            // state_dir() returns None on macOS/Windows, fall back to data_dir
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

fn file_format(path: &Path) -> Result<FileFormat, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(FileFormat::Toml),
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

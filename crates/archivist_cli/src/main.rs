//! Archivist CLI - command-line interface for the guild archiver.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use archivist::Snowflake;
use archivist::sync::SyncScope;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "archivist")]
#[command(version)]
#[command(about = "A checkpointed archiver for Discord guilds")]
#[command(
    long_about = "Archivist copies the full message history of Discord guilds into a \
relational database. Every run resumes from per-channel checkpoints: channels are \
backfilled from their newest message down to the first, then kept current with \
incremental passes. Rate limits are honoured per credential."
)]
#[command(after_long_help = r#"EXAMPLES
    Archive every guild of every configured account:
        $ archivist sync

    Archive a single guild or a single channel:
        $ archivist sync --guild-id 81384788765712384
        $ archivist sync --channel-id 381887113391505410

    Show where each channel's backfill stands:
        $ archivist status

    Use an explicit config file with debug logging:
        $ archivist --config ./archive.json -v sync

CONFIGURATION
    Archivist reads configuration from:
      1. ~/.config/archivist/config.toml (or $XDG_CONFIG_HOME/archivist/config.toml)
      2. The file given with --config (.toml or .json)
      3. Environment variables (ARCHIVIST_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    ARCHIVIST_DATABASE_URL    Database connection string (default: ~/.local/state/archivist/archive.db)
    ARCHIVIST_PAGE_SIZE       Messages per request, 1-100 (default: 100)
    ARCHIVIST_TIMEOUT_SECS    HTTP request timeout (default: 30)
    ARCHIVIST_GLOBAL_RPS      Requests per second per account, 0 to disable (default: 50)
    RUST_LOG                  Log filter, overridden by -v and --debug
"#)]
struct Cli {
    /// Path to a config file (TOML or JSON)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging for archivist
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging, including third-party crates at debug
    #[arg(long, global = true)]
    debug: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive configured guilds, or a single guild or channel
    Sync {
        /// Only sync this guild
        #[arg(long, value_name = "ID", conflicts_with = "channel_id")]
        guild_id: Option<Snowflake>,

        /// Only sync this channel or thread
        #[arg(long, value_name = "ID")]
        channel_id: Option<Snowflake>,
    },
    /// Show archive checkpoints
    Status {
        /// Only show channels of this guild
        #[arg(long, value_name = "ID")]
        guild_id: Option<Snowflake>,
    },
    /// Run database migrations
    #[cfg(feature = "migrate")]
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[cfg(feature = "migrate")]
#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli)?;

    // Load configuration (defaults -> config files -> env vars)
    let config = config::Config::load(cli.config.as_deref())?;
    let database_url = config.database_url()?;
    ensure_sqlite_dir(&database_url)?;

    match cli.command {
        Commands::Sync {
            guild_id,
            channel_id,
        } => {
            let scope = match (guild_id, channel_id) {
                (_, Some(channel_id)) => SyncScope::Channel(channel_id),
                (Some(guild_id), None) => SyncScope::Guild(guild_id),
                (None, None) => SyncScope::All,
            };
            let stop = shutdown::setup_shutdown_handler();
            commands::sync::handle_sync(scope, &config, &database_url, stop).await?;
        }
        Commands::Status { guild_id } => {
            commands::status::handle_status(guild_id, &database_url).await?;
        }
        #[cfg(feature = "migrate")]
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = if cli.debug {
        EnvFilter::new("debug,archivist=trace,archivist_cli=trace")
    } else if cli.verbose {
        EnvFilter::new("archivist=debug,archivist_cli=debug")
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("archivist=info,archivist_cli=info"),
        }
    };

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Ensure the database directory exists for SQLite.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = Path::new(db_path);

    // Warn if using a relative path (can cause issues depending on cwd)
    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

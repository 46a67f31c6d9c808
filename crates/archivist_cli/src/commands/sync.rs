use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use archivist::api::ClientConfig;
use archivist::db;
use archivist::sync::{Account, RunSummary, SyncOptions, SyncScope, run_sync};
use archivist::{DiscordClient, SeaOrmStore};
use console::{Term, style};

use crate::config::Config;
use crate::progress::LoggingReporter;

/// Maximum number of individual problems listed in the summary.
const MAX_LISTED: usize = 20;

pub(crate) async fn handle_sync(
    scope: SyncScope,
    config: &Config,
    database_url: &str,
    stop: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let is_tty = Term::stdout().is_term();
    let accounts = build_accounts(config)?;

    #[cfg(feature = "migrate")]
    let connection = db::connect_and_migrate(database_url).await?;
    #[cfg(not(feature = "migrate"))]
    let connection = db::connect(database_url).await?;

    let reporter = Arc::new(LoggingReporter::new());
    let callback = reporter.as_callback();
    let store = SeaOrmStore::new(connection).with_progress(Arc::clone(&callback));

    let options = SyncOptions::default()
        .with_page_size(config.page_size)
        .with_threads(config.include_threads)
        .with_stop_flag(stop);

    tracing::info!(accounts = accounts.len(), scope = ?scope, "Starting sync");
    let summary = run_sync(&accounts, scope, &store, &options, Some(callback.as_ref())).await?;

    print_summary(&summary, options.should_stop(), is_tty);
    Ok(())
}

fn build_accounts(config: &Config) -> Result<Vec<Account>, Box<dyn std::error::Error>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let mut accounts = Vec::with_capacity(config.accounts.len());

    for account in &config.accounts {
        let mut client_config = ClientConfig::new(&account.token, &account.user_agent);
        client_config.global_rps = config.global_rps();

        let client = DiscordClient::new(client_config, timeout)?;
        accounts.push(Account {
            name: account.name.clone(),
            api: Arc::new(client),
            guilds: account.guilds.clone(),
        });
    }

    Ok(accounts)
}

fn print_summary(summary: &RunSummary, stopped: bool, is_tty: bool) {
    let skipped: Vec<_> = summary.skipped().collect();
    let failed: Vec<_> = summary.failed().collect();
    let errors: Vec<String> = summary
        .guilds
        .iter()
        .flat_map(|g| g.errors.iter().chain(g.metadata_skipped.iter()))
        .chain(summary.errors.iter())
        .cloned()
        .collect();

    if !is_tty {
        tracing::info!(
            guilds = summary.guilds.len(),
            messages = summary.messages_archived(),
            channels = summary.channels_synced(),
            skipped = skipped.len(),
            failed = failed.len(),
            errors = errors.len(),
            stopped,
            "Sync complete"
        );
        for channel in &skipped {
            tracing::info!(channel_id = %channel.channel_id, name = %channel.name, reason = %channel.reason, "Skipped");
        }
        for channel in &failed {
            tracing::error!(channel_id = %channel.channel_id, name = %channel.name, error = %channel.error, "Failed");
        }
        for error in &errors {
            tracing::warn!(error = %error, "Sync problem");
        }
        return;
    }

    println!();
    for guild in &summary.guilds {
        let name = guild.name.as_deref().unwrap_or("unknown guild");
        println!(
            "{} {} ({}) via {}: {} messages, {} channels",
            style("✓").green().bold(),
            style(name).cyan(),
            guild.guild_id,
            guild.account,
            guild.messages_archived,
            guild.channels_synced
        );
    }

    println!(
        "\n{} messages archived across {} channels",
        style(summary.messages_archived()).bold(),
        summary.channels_synced()
    );

    if !skipped.is_empty() {
        println!("\n{} ({}):", style("Skipped").yellow().bold(), skipped.len());
        for channel in skipped.iter().take(MAX_LISTED) {
            println!("  - #{} ({}): {}", channel.name, channel.channel_id, channel.reason);
        }
        if skipped.len() > MAX_LISTED {
            println!("  ... and {} more", skipped.len() - MAX_LISTED);
        }
    }

    if !failed.is_empty() || !errors.is_empty() {
        eprintln!(
            "\n{} ({}):",
            style("Errors").red().bold(),
            failed.len() + errors.len()
        );
        for channel in failed.iter().take(MAX_LISTED) {
            eprintln!("  - #{} ({}): {}", channel.name, channel.channel_id, channel.error);
        }
        for error in errors.iter().take(MAX_LISTED) {
            eprintln!("  - {error}");
        }
    }

    if stopped {
        println!(
            "\n{} Stopped early; the next run resumes from the saved checkpoints.",
            style("⚠").yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use archivist::Snowflake;

    #[test]
    fn test_build_accounts_keeps_guilds() {
        let config = Config {
            accounts: vec![AccountConfig {
                name: "main".to_string(),
                token: "token".to_string(),
                user_agent: "archivist/test".to_string(),
                guilds: vec![Snowflake(1), Snowflake(2)],
            }],
            ..Config::default()
        };

        let accounts = build_accounts(&config).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "main");
        assert_eq!(accounts[0].guilds, vec![Snowflake(1), Snowflake(2)]);
    }

    #[test]
    fn test_summary_printing_handles_empty_run() {
        print_summary(&RunSummary::default(), false, false);
        print_summary(&RunSummary::default(), true, true);
    }
}

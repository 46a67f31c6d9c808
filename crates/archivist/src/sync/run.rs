//! Run entry point: credential validation and scope dispatch.

use std::sync::Arc;

use futures::future::join_all;

use crate::api::{DiscordApi, short_error_message};
use crate::snowflake::Snowflake;

use super::coordinator::GuildSyncCoordinator;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::store::ArchiveStore;
use super::types::{GuildReport, RunError, RunSummary, SyncOptions, SyncScope};

/// One configured credential and the guilds it archives.
#[derive(Clone)]
pub struct Account {
    pub name: String,
    pub api: Arc<dyn DiscordApi>,
    pub guilds: Vec<Snowflake>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("guilds", &self.guilds)
            .finish_non_exhaustive()
    }
}

struct ValidatedAccount<'a> {
    account: &'a Account,
    user_id: Snowflake,
}

/// Run a sync over `scope`.
///
/// Returns `Err` only for configuration-level failures, all detected before any
/// guild is touched: no accounts, an unreachable store, or a credential the
/// server rejects. Everything else lands in the [`RunSummary`].
pub async fn run_sync<S: ArchiveStore + ?Sized>(
    accounts: &[Account],
    scope: SyncScope,
    store: &S,
    options: &SyncOptions,
    on_progress: Option<&ProgressCallback>,
) -> Result<RunSummary, RunError> {
    if accounts.is_empty() {
        return Err(RunError::NoAccounts);
    }
    store.ping().await?;

    let mut validated = Vec::with_capacity(accounts.len());
    for account in accounts {
        validated.push(validate(account, on_progress).await?);
    }

    let mut summary = RunSummary::default();
    match scope {
        SyncScope::All => {
            // Each credential has its own rate-limit state, so accounts run side by
            // side while each walks its own guilds one at a time.
            let passes = validated
                .iter()
                .map(|entry| account_pass(entry, store, options, on_progress));
            for reports in join_all(passes).await {
                for report in reports {
                    summary.absorb(report);
                }
            }
        }
        SyncScope::Guild(guild_id) => {
            let entry = validated
                .iter()
                .find(|v| v.account.guilds.contains(&guild_id))
                .or_else(|| validated.first());
            if let Some(entry) = entry {
                let report = coordinator(entry, store, options, on_progress)
                    .sync_guild(guild_id)
                    .await;
                summary.absorb(report);
            }
        }
        SyncScope::Channel(channel_id) => {
            let mut last_error = None;
            for entry in &validated {
                match entry.account.api.channel(channel_id).await {
                    Ok(channel) => {
                        let report = coordinator(entry, store, options, on_progress)
                            .sync_single_channel(channel)
                            .await;
                        summary.absorb(report);
                        return Ok(summary);
                    }
                    Err(e) => {
                        tracing::debug!(
                            account = %entry.account.name,
                            error = %e,
                            "Channel not visible to account"
                        );
                        last_error = Some(short_error_message(&e));
                    }
                }
            }
            let detail = last_error.unwrap_or_default();
            tracing::warn!(%channel_id, error = %detail, "No account can see channel");
            summary
                .errors
                .push(format!("no account can see channel {channel_id}: {detail}"));
        }
    }

    Ok(summary)
}

async fn account_pass<S: ArchiveStore + ?Sized>(
    entry: &ValidatedAccount<'_>,
    store: &S,
    options: &SyncOptions,
    on_progress: Option<&ProgressCallback>,
) -> Vec<GuildReport> {
    let mut reports = Vec::with_capacity(entry.account.guilds.len());
    for guild_id in &entry.account.guilds {
        if options.should_stop() {
            tracing::info!(account = %entry.account.name, "Stop requested, not starting further guilds");
            break;
        }
        reports.push(
            coordinator(entry, store, options, on_progress)
                .sync_guild(*guild_id)
                .await,
        );
    }
    reports
}

fn coordinator<'a, S: ArchiveStore + ?Sized>(
    entry: &'a ValidatedAccount<'a>,
    store: &'a S,
    options: &'a SyncOptions,
    on_progress: Option<&'a ProgressCallback>,
) -> GuildSyncCoordinator<'a, dyn DiscordApi, S> {
    GuildSyncCoordinator::new(
        entry.account.api.as_ref(),
        store,
        options,
        &entry.account.name,
        entry.user_id,
    )
    .with_progress(on_progress)
}

async fn validate<'a>(
    account: &'a Account,
    on_progress: Option<&ProgressCallback>,
) -> Result<ValidatedAccount<'a>, RunError> {
    emit(
        on_progress,
        SyncProgress::ValidatingAccount {
            account: account.name.clone(),
        },
    );

    match account.api.current_user().await {
        Ok(user) => {
            tracing::info!(account = %account.name, user_id = %user.id, "Credential accepted");
            emit(
                on_progress,
                SyncProgress::AccountReady {
                    account: account.name.clone(),
                    user_id: user.id,
                    username: user.username.clone(),
                },
            );
            Ok(ValidatedAccount {
                account,
                user_id: user.id,
            })
        }
        Err(e) if e.is_unauthorized() || e.is_forbidden() => Err(RunError::InvalidCredential {
            account: account.name.clone(),
            message: short_error_message(&e),
        }),
        Err(source) => Err(RunError::Validation {
            account: account.name.clone(),
            source,
        }),
    }
}

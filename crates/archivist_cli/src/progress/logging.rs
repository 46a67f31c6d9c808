use archivist::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::ValidatingAccount { account } => {
                tracing::debug!(account = %account, "Validating credential");
            }

            SyncProgress::AccountReady {
                account,
                user_id,
                username,
            } => {
                tracing::info!(
                    account = %account,
                    user_id = %user_id,
                    username = username.as_deref().unwrap_or("unknown"),
                    "Account ready"
                );
            }

            SyncProgress::GuildStarted { guild_id } => {
                tracing::info!(guild_id = %guild_id, "Syncing guild");
            }

            SyncProgress::GuildMetadataSynced {
                guild_id,
                name,
                roles,
                emojis,
                stickers,
                events,
            } => {
                tracing::info!(
                    guild_id = %guild_id,
                    name = %name,
                    roles,
                    emojis,
                    stickers,
                    events,
                    "Guild metadata stored"
                );
            }

            SyncProgress::MetadataSkipped {
                guild_id,
                kind,
                error,
            } => {
                tracing::warn!(guild_id = %guild_id, kind, error = %error, "Metadata listing skipped");
            }

            SyncProgress::ChannelsDiscovered {
                guild_id,
                channels,
                threads,
                readable,
            } => {
                tracing::info!(guild_id = %guild_id, channels, threads, readable, "Channels discovered");
            }

            SyncProgress::ChannelStarted { channel_id, name } => {
                tracing::debug!(channel_id = %channel_id, name = %name, "Syncing channel");
            }

            SyncProgress::BatchPersisted {
                channel_id,
                phase,
                count,
                oldest,
                newest,
            } => {
                tracing::debug!(
                    channel_id = %channel_id,
                    phase = %phase,
                    count,
                    oldest = %oldest,
                    newest = %newest,
                    "Batch persisted"
                );
            }

            SyncProgress::BackfillComplete { channel_id } => {
                tracing::info!(channel_id = %channel_id, "Backfill complete");
            }

            SyncProgress::ChannelSkipped {
                channel_id,
                name,
                reason,
            } => {
                tracing::info!(channel_id = %channel_id, name = %name, reason = %reason, "Channel skipped");
            }

            SyncProgress::ChannelFailed {
                channel_id,
                name,
                error,
            } => {
                tracing::error!(channel_id = %channel_id, name = %name, error = %error, "Channel failed");
            }

            SyncProgress::ChannelFinished {
                channel_id,
                backfilled,
                incremental,
            } => {
                if backfilled + incremental > 0 {
                    tracing::info!(channel_id = %channel_id, backfilled, incremental, "Channel synced");
                } else {
                    tracing::debug!(channel_id = %channel_id, "Channel up to date");
                }
            }

            SyncProgress::GuildFinished {
                guild_id,
                archived,
                synced,
                skipped,
                failed,
            } => {
                tracing::info!(guild_id = %guild_id, archived, synced, skipped, failed, "Guild finished");
            }

            SyncProgress::StoreRetry {
                operation,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(operation = %operation, retry_after_ms, attempt, "Retrying database write");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!("{}", message);
            }

            other => {
                tracing::debug!(event = ?other, "Sync progress");
            }
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}

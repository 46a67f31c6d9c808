//! Per-guild orchestration: metadata, channel discovery, then each channel's
//! backfill followed by one incremental pass.

use crate::api::{DiscordApi, Result as ApiResult, short_error_message};
use crate::discord::{ApiChannel, ApiRole, Raw};
use crate::permissions::{Access, PermissionContext};
use crate::snowflake::Snowflake;

use super::backfill::BackfillEngine;
use super::channels::ChannelFetcher;
use super::checkpoint::Checkpoint;
use super::incremental::IncrementalEngine;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::store::ArchiveStore;
use super::types::{
    ChannelOutcome, ChannelResult, GuildReport, Interrupted, SkipReason, SyncError, SyncOptions,
};

/// Drives one credential through one guild.
///
/// Failures are contained at the smallest scope they affect: a channel error
/// is recorded and the next channel starts, a metadata listing error is recorded
/// and channel processing still runs. Nothing here returns an error; the
/// outcome is the [`GuildReport`].
pub struct GuildSyncCoordinator<'a, A: DiscordApi + ?Sized, S: ArchiveStore + ?Sized> {
    api: &'a A,
    store: &'a S,
    options: &'a SyncOptions,
    on_progress: Option<&'a ProgressCallback>,
    account: &'a str,
    user_id: Snowflake,
}

impl<'a, A: DiscordApi + ?Sized, S: ArchiveStore + ?Sized> GuildSyncCoordinator<'a, A, S> {
    pub fn new(
        api: &'a A,
        store: &'a S,
        options: &'a SyncOptions,
        account: &'a str,
        user_id: Snowflake,
    ) -> Self {
        Self {
            api,
            store,
            options,
            on_progress: None,
            account,
            user_id,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Full pass over a guild.
    #[tracing::instrument(skip(self), fields(account = %self.account))]
    pub async fn sync_guild(&self, guild_id: Snowflake) -> GuildReport {
        let mut report = GuildReport::new(guild_id, self.account);
        emit(self.on_progress, SyncProgress::GuildStarted { guild_id });

        let guild = match self.api.guild(guild_id).await {
            Ok(guild) => guild,
            Err(e) => {
                tracing::error!(error = %e, "Could not fetch guild");
                report
                    .errors
                    .push(format!("could not fetch guild: {}", short_error_message(&e)));
                return self.finish(report);
            }
        };
        report.name = Some(guild.name.clone());

        if let Err(e) = self.store.upsert_guild(&guild).await {
            tracing::error!(error = %e, "Could not store guild");
            report.errors.push(format!("could not store guild: {e}"));
            return self.finish(report);
        }

        let roles = self
            .listing(&mut report, "roles", self.api.guild_roles(guild_id))
            .await;
        let emojis = self
            .listing(&mut report, "emojis", self.api.guild_emojis(guild_id))
            .await;
        let stickers = self
            .listing(&mut report, "stickers", self.api.guild_stickers(guild_id))
            .await;
        let events = self
            .listing(
                &mut report,
                "scheduled events",
                self.api.guild_scheduled_events(guild_id),
            )
            .await;

        let mut stored = Vec::new();
        if let Some(roles) = &roles {
            stored.push(("roles", self.store.upsert_roles(guild_id, roles).await));
        }
        if let Some(emojis) = &emojis {
            stored.push(("emojis", self.store.upsert_emojis(guild_id, emojis).await));
        }
        if let Some(stickers) = &stickers {
            stored.push(("stickers", self.store.upsert_stickers(guild_id, stickers).await));
        }
        if let Some(events) = &events {
            stored.push((
                "scheduled events",
                self.store.upsert_scheduled_events(events).await,
            ));
        }
        for (kind, result) in stored {
            if let Err(e) = result {
                tracing::error!(kind, error = %e, "Could not store guild metadata");
                report.errors.push(format!("could not store {kind}: {e}"));
            }
        }

        emit(
            self.on_progress,
            SyncProgress::GuildMetadataSynced {
                guild_id,
                name: guild.name.clone(),
                roles: roles.as_ref().map_or(0, Vec::len),
                emojis: emojis.as_ref().map_or(0, Vec::len),
                stickers: stickers.as_ref().map_or(0, Vec::len),
                events: events.as_ref().map_or(0, Vec::len),
            },
        );

        let permissions = match &roles {
            Some(roles) => self.permission_context(&guild.data, roles).await,
            None => None,
        };
        let mut fetcher = ChannelFetcher::new(self.api, self.options.thread_page_size);
        if let Some(ctx) = &permissions {
            fetcher = fetcher.with_permissions(ctx);
        }

        let discovery = match fetcher.discover(guild_id, self.options.include_threads).await {
            Ok(discovery) => discovery,
            Err(e) => {
                tracing::error!(error = %e, "Could not list channels");
                report.errors.push(format!(
                    "could not list channels: {}",
                    short_error_message(&e)
                ));
                return self.finish(report);
            }
        };
        for message in &discovery.warnings {
            emit(
                self.on_progress,
                SyncProgress::Warning {
                    message: message.clone(),
                },
            );
        }

        if let Err(e) = self.store.upsert_channels(Some(guild_id), &discovery.all).await {
            tracing::error!(error = %e, "Could not store channels");
            report.errors.push(format!("could not store channels: {e}"));
            return self.finish(report);
        }
        emit(
            self.on_progress,
            SyncProgress::ChannelsDiscovered {
                guild_id,
                channels: discovery.all.len() - discovery.thread_count,
                threads: discovery.thread_count,
                readable: discovery.readable(),
            },
        );

        for candidate in &discovery.candidates {
            let result = if self.options.should_stop() {
                self.skipped(&candidate.channel, SkipReason::Cancelled)
            } else {
                match candidate.access {
                    Access::Accessible => self.sync_channel(guild_id, &candidate.channel).await,
                    Access::Forbidden => self.skipped(&candidate.channel, SkipReason::Forbidden),
                    Access::Unknown => self.skipped(&candidate.channel, SkipReason::AccessUnknown),
                }
            };
            report.record(result);
        }

        self.finish(report)
    }

    /// Targeted pass over one channel (or thread) the caller already fetched.
    ///
    /// Guild metadata is not refreshed. Access is not pre-checked: a forbidden
    /// channel surfaces as a skip from its first fetch.
    #[tracing::instrument(skip_all, fields(account = %self.account, channel_id = %channel.id))]
    pub async fn sync_single_channel(&self, channel: Raw<ApiChannel>) -> GuildReport {
        // Channels outside any guild are archived under guild id 0.
        let guild_id = channel.guild_id.unwrap_or_default();
        let mut report = GuildReport::new(guild_id, self.account);

        if let Err(e) = self
            .store
            .upsert_channels(channel.guild_id, std::slice::from_ref(&channel))
            .await
        {
            report.errors.push(format!("could not store channel: {e}"));
            return self.finish(report);
        }

        let result = self.sync_channel(guild_id, &channel).await;
        report.record(result);
        self.finish(report)
    }

    /// Backfill to completion (or abort), then one incremental pass.
    ///
    /// An aborted backfill skips the incremental pass; the next run resumes both
    /// from the saved checkpoint.
    pub async fn sync_channel(&self, guild_id: Snowflake, channel: &ApiChannel) -> ChannelResult {
        let name = channel.label();
        emit(
            self.on_progress,
            SyncProgress::ChannelStarted {
                channel_id: channel.id,
                name: name.clone(),
            },
        );

        let mut checkpoint = match self.store.get_checkpoint(channel.id).await {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => Checkpoint::new(channel.id, guild_id),
            Err(e) => return self.aborted(channel, 0, SyncError::Store(e)),
        };

        let backfill = BackfillEngine::new(self.api, self.store, self.options)
            .with_progress(self.on_progress)
            .run(&mut checkpoint)
            .await;
        let backfilled = match backfill {
            Ok(pass) => pass.archived,
            Err(Interrupted { partial, error }) => {
                return self.aborted(channel, partial.archived, error);
            }
        };

        let incremental = IncrementalEngine::new(self.api, self.store, self.options)
            .with_progress(self.on_progress)
            .run(&mut checkpoint)
            .await;
        let incremental = match incremental {
            Ok(pass) => pass.archived,
            Err(Interrupted { partial, error }) => {
                return self.aborted(channel, backfilled + partial.archived, error);
            }
        };

        tracing::info!(
            channel = %name,
            backfilled,
            incremental,
            backfill_complete = checkpoint.is_backfill_complete(),
            "Channel synced"
        );
        emit(
            self.on_progress,
            SyncProgress::ChannelFinished {
                channel_id: channel.id,
                backfilled,
                incremental,
            },
        );
        ChannelResult {
            channel_id: channel.id,
            name,
            archived: backfilled + incremental,
            outcome: ChannelOutcome::Synced {
                backfilled,
                incremental,
                backfill_complete: checkpoint.is_backfill_complete(),
            },
        }
    }

    /// Fetch one metadata listing. Failures are recorded and yield `None`.
    async fn listing<T>(
        &self,
        report: &mut GuildReport,
        kind: &'static str,
        fetch: impl Future<Output = ApiResult<Vec<T>>>,
    ) -> Option<Vec<T>> {
        match fetch.await {
            Ok(items) => Some(items),
            Err(e) => {
                let error = short_error_message(&e);
                if e.is_forbidden() {
                    tracing::info!(kind, "Metadata listing forbidden, skipping");
                    report.metadata_skipped.push(kind.to_string());
                } else {
                    tracing::warn!(kind, error = %e, "Metadata listing failed");
                    report.errors.push(format!("could not list {kind}: {error}"));
                }
                emit(
                    self.on_progress,
                    SyncProgress::MetadataSkipped {
                        guild_id: report.guild_id,
                        kind,
                        error,
                    },
                );
                None
            }
        }
    }

    /// Local permission evaluation, when the credential's membership can be read.
    async fn permission_context(
        &self,
        guild: &crate::discord::ApiGuild,
        roles: &[Raw<ApiRole>],
    ) -> Option<PermissionContext> {
        match self.api.current_member(guild.id).await {
            Ok(member) => {
                let roles: Vec<ApiRole> = roles.iter().map(|r| r.data.clone()).collect();
                Some(PermissionContext::new(
                    guild.id,
                    guild.owner_id,
                    self.user_id,
                    &roles,
                    &member.roles,
                ))
            }
            Err(e) => {
                tracing::debug!(error = %e, "Member lookup failed, probing channels instead");
                None
            }
        }
    }

    fn skipped(&self, channel: &ApiChannel, reason: SkipReason) -> ChannelResult {
        tracing::info!(channel = %channel.label(), %reason, "Skipping channel");
        emit(
            self.on_progress,
            SyncProgress::ChannelSkipped {
                channel_id: channel.id,
                name: channel.label(),
                reason,
            },
        );
        ChannelResult {
            channel_id: channel.id,
            name: channel.label(),
            archived: 0,
            outcome: ChannelOutcome::Skipped { reason },
        }
    }

    fn aborted(&self, channel: &ApiChannel, archived: u64, error: SyncError) -> ChannelResult {
        if let Some(reason) = error.skip_reason() {
            let mut result = self.skipped(channel, reason);
            result.archived = archived;
            return result;
        }

        let message = error.short_message();
        tracing::warn!(channel = %channel.label(), archived, error = %message, "Channel pass failed");
        emit(
            self.on_progress,
            SyncProgress::ChannelFailed {
                channel_id: channel.id,
                name: channel.label(),
                error: message.clone(),
            },
        );
        ChannelResult {
            channel_id: channel.id,
            name: channel.label(),
            archived,
            outcome: ChannelOutcome::Failed { error: message },
        }
    }

    fn finish(&self, report: GuildReport) -> GuildReport {
        tracing::info!(
            guild_id = %report.guild_id,
            archived = report.messages_archived,
            synced = report.channels_synced,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Guild pass finished"
        );
        emit(
            self.on_progress,
            SyncProgress::GuildFinished {
                guild_id: report.guild_id,
                archived: report.messages_archived,
                synced: report.channels_synced,
                skipped: report.skipped.len(),
                failed: report.failed.len(),
            },
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{FakeApi, MemoryStore, channel, channel_json};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const GUILD: u64 = 1000;
    const USER: u64 = 7;

    fn options() -> SyncOptions {
        SyncOptions::default().with_page_size(50)
    }

    fn three_channel_guild() -> FakeApi {
        FakeApi::new(USER)
            .with_guild(GUILD, "Rustaceans")
            .with_channel(GUILD, channel_json(GUILD, 10, 0, "a"))
            .with_channel(GUILD, channel_json(GUILD, 20, 0, "b"))
            .with_channel(GUILD, channel_json(GUILD, 30, 0, "c"))
            .with_messages(10, 100..=250)
            .with_messages(20, 300..=320)
            .with_messages(30, 400..=460)
    }

    #[tokio::test]
    async fn test_forbidden_channel_is_isolated_by_overwrite() {
        let denied = json!({
            "id": "20",
            "guild_id": GUILD.to_string(),
            "type": 0,
            "name": "b",
            "permission_overwrites": [
                {"id": GUILD.to_string(), "type": 0, "allow": "0", "deny": (1u64 << 10).to_string()}
            ]
        });
        let api = FakeApi::new(USER)
            .with_guild(GUILD, "Rustaceans")
            .with_channel(GUILD, channel_json(GUILD, 10, 0, "a"))
            .with_channel(GUILD, denied)
            .with_channel(GUILD, channel_json(GUILD, 30, 0, "c"))
            .with_messages(10, 100..=250)
            .with_messages(20, 300..=320)
            .with_messages(30, 400..=460);
        let store = MemoryStore::new();
        let options = options();

        let report = GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .sync_guild(Snowflake(GUILD))
            .await;

        assert_eq!(report.channels_synced, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].channel_id, Snowflake(20));
        assert_eq!(report.skipped[0].reason, SkipReason::Forbidden);
        assert!(!report.has_errors());
        assert_eq!(report.messages_archived, 151 + 61);
        // The forbidden channel was never fetched.
        assert_eq!(api.message_calls(20), 0);
        assert_eq!(store.message_ids(10).len(), 151);
        assert_eq!(store.message_ids(30).len(), 61);
        assert!(store.checkpoint(20).is_none());
    }

    #[tokio::test]
    async fn test_forbidden_channel_is_isolated_by_probe() {
        let api = three_channel_guild();
        api.hide_member();
        api.forbid_channel(20);
        let store = MemoryStore::new();
        let options = options();

        let report = GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .sync_guild(Snowflake(GUILD))
            .await;

        assert_eq!(report.channels_synced, 2);
        assert_eq!(report.skipped[0].channel_id, Snowflake(20));
        assert_eq!(report.skipped[0].reason, SkipReason::Forbidden);
        assert!(store.checkpoint(10).expect("a").is_backfill_complete());
        assert!(store.checkpoint(30).expect("c").is_backfill_complete());
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_stop_siblings() {
        let api = three_channel_guild();
        let store = MemoryStore::new();
        let options = options();
        // Every fetch on channel b fails after the client's retries.
        api.fail_after(20, 0);

        let report = GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .sync_guild(Snowflake(GUILD))
            .await;

        assert_eq!(report.channels_synced, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].channel_id, Snowflake(20));
        assert!(report.failed[0].error.contains("502"));
        assert!(report.has_errors());
        assert!(store.checkpoint(20).is_none());
    }

    #[tokio::test]
    async fn test_forbidden_emoji_is_recorded_not_fatal() {
        let api = three_channel_guild();
        api.forbid_emojis();
        let store = MemoryStore::new();
        let options = options();

        let report = GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .sync_guild(Snowflake(GUILD))
            .await;

        assert_eq!(report.metadata_skipped, vec!["emojis".to_string()]);
        assert!(report.errors.is_empty());
        assert_eq!(report.channels_synced, 3);
        assert_eq!(report.name.as_deref(), Some("Rustaceans"));
        assert!(store.state().guilds.contains_key(&Snowflake(GUILD)));
        assert!(store.state().emojis.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_guild_is_a_guild_error() {
        let api = FakeApi::new(USER);
        let store = MemoryStore::new();
        let options = options();

        let report = GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .sync_guild(Snowflake(GUILD))
            .await;
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Unknown Guild"));
        assert_eq!(report.channels_synced, 0);
    }

    #[tokio::test]
    async fn test_second_run_archives_nothing_new() {
        let api = three_channel_guild();
        let store = MemoryStore::new();
        let options = options();
        let coordinator =
            GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER));

        let first = coordinator.sync_guild(Snowflake(GUILD)).await;
        assert_eq!(first.messages_archived, 151 + 21 + 61);
        let checkpoint = store.checkpoint(10).expect("checkpoint");
        assert_eq!(checkpoint.oldest(), Some(Snowflake(100)));
        assert_eq!(checkpoint.newest(), Some(Snowflake(250)));

        let second = coordinator.sync_guild(Snowflake(GUILD)).await;
        assert_eq!(second.messages_archived, 0);
        assert_eq!(second.channels_synced, 3);
        let again = store.checkpoint(10).expect("checkpoint");
        assert_eq!(again.oldest(), checkpoint.oldest());
        assert_eq!(again.newest(), checkpoint.newest());
    }

    #[tokio::test]
    async fn test_stop_flag_skips_remaining_channels() {
        let api = three_channel_guild();
        let store = MemoryStore::new();
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let options = options().with_stop_flag(stop);

        let report = GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .sync_guild(Snowflake(GUILD))
            .await;
        assert_eq!(report.channels_synced, 0);
        assert_eq!(report.skipped.len(), 3);
        assert!(report.skipped.iter().all(|s| s.reason == SkipReason::Cancelled));
        assert!(!report.has_errors());
    }

    #[tokio::test]
    async fn test_single_channel_scope() {
        let api = three_channel_guild();
        let store = MemoryStore::new();
        let options = options();

        let report = GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .sync_single_channel(channel(GUILD, 30, 0, "c"))
            .await;

        assert_eq!(report.channels_synced, 1);
        assert_eq!(report.messages_archived, 61);
        assert!(store.message_ids(10).is_empty());
        assert!(store.state().channels.contains_key(&Snowflake(30)));
    }

    #[tokio::test]
    async fn test_progress_events_cover_the_pass() {
        let api = three_channel_guild();
        let store = MemoryStore::new();
        let options = options();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            sink.lock().expect("events").push(event);
        });

        GuildSyncCoordinator::new(&api, &store, &options, "main", Snowflake(USER))
            .with_progress(Some(&callback))
            .sync_guild(Snowflake(GUILD))
            .await;

        let events = events.lock().expect("events");
        assert!(matches!(events.first(), Some(SyncProgress::GuildStarted { .. })));
        assert!(matches!(events.last(), Some(SyncProgress::GuildFinished { synced: 3, .. })));
        let completions = events
            .iter()
            .filter(|e| matches!(e, SyncProgress::BackfillComplete { .. }))
            .count();
        assert_eq!(completions, 3);
    }
}

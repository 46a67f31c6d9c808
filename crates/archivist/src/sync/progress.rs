//! Progress reporting for sync runs.
//!
//! Events are emitted through an optional callback so front ends can render them
//! however they like; the library itself only logs through `tracing`.

use crate::snowflake::Snowflake;

use super::types::SkipReason;

/// Which engine produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Backfill,
    Incremental,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backfill => f.write_str("backfill"),
            Self::Incremental => f.write_str("incremental"),
        }
    }
}

/// Progress events emitted during a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Checking a credential with `GET /users/@me`.
    ValidatingAccount { account: String },

    /// Credential accepted.
    AccountReady {
        account: String,
        user_id: Snowflake,
        username: Option<String>,
    },

    /// Starting a guild pass.
    GuildStarted { guild_id: Snowflake },

    /// Guild snapshot and guild-owned entities stored.
    GuildMetadataSynced {
        guild_id: Snowflake,
        name: String,
        roles: usize,
        emojis: usize,
        stickers: usize,
        events: usize,
    },

    /// A metadata listing could not be read (usually a missing permission).
    MetadataSkipped {
        guild_id: Snowflake,
        kind: &'static str,
        error: String,
    },

    /// Channel and thread enumeration finished.
    ChannelsDiscovered {
        guild_id: Snowflake,
        channels: usize,
        threads: usize,
        readable: usize,
    },

    /// Guild pass finished.
    GuildFinished {
        guild_id: Snowflake,
        archived: u64,
        synced: usize,
        skipped: usize,
        failed: usize,
    },

    /// Starting a channel pass.
    ChannelStarted { channel_id: Snowflake, name: String },

    /// A batch of messages was persisted and the checkpoint advanced.
    BatchPersisted {
        channel_id: Snowflake,
        phase: SyncPhase,
        count: usize,
        oldest: Snowflake,
        newest: Snowflake,
    },

    /// The channel's history has been fully walked.
    BackfillComplete { channel_id: Snowflake },

    /// Channel skipped for this run.
    ChannelSkipped {
        channel_id: Snowflake,
        name: String,
        reason: SkipReason,
    },

    /// Channel pass aborted by an error.
    ChannelFailed {
        channel_id: Snowflake,
        name: String,
        error: String,
    },

    /// Channel pass finished.
    ChannelFinished {
        channel_id: Snowflake,
        backfilled: u64,
        incremental: u64,
    },

    /// A database write hit a transient error and will be retried.
    StoreRetry {
        operation: String,
        retry_after_ms: u64,
        attempt: u32,
    },

    /// Non-fatal warning.
    Warning { message: String },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

//! Options, outcomes and errors shared by the sync engines.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::api::{ApiError, MAX_PAGE_SIZE, short_error_message};
use crate::repository::RepositoryError;
use crate::snowflake::Snowflake;

/// Default number of messages requested per page.
pub const DEFAULT_PAGE_SIZE: u8 = MAX_PAGE_SIZE;

/// Default number of threads requested per archived-thread page.
pub const DEFAULT_THREAD_PAGE_SIZE: u8 = MAX_PAGE_SIZE;

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Messages per page, within `1..=100`.
    pub page_size: u8,
    /// Threads per archived-thread page, within `1..=100`.
    pub thread_page_size: u8,
    /// Whether active and archived threads are synced alongside their parents.
    pub include_threads: bool,
    /// Cooperative stop flag, checked between batches and between channels.
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            thread_page_size: DEFAULT_THREAD_PAGE_SIZE,
            include_threads: true,
            stop: None,
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn with_page_size(mut self, page_size: u8) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub fn with_threads(mut self, include_threads: bool) -> Self {
        self.include_threads = include_threads;
        self
    }

    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Effective page size.
    #[must_use]
    pub fn page_size(&self) -> u8 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// What a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncScope {
    /// Every guild configured for every account.
    All,
    Guild(Snowflake),
    Channel(Snowflake),
}

/// Why a channel was not synced this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The credential cannot read the channel.
    Forbidden,
    /// Access could not be determined; the channel is retried next run.
    AccessUnknown,
    /// The run was stopped before the channel finished.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forbidden => f.write_str("forbidden"),
            Self::AccessUnknown => f.write_str("access unknown"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Result of one channel pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Synced {
        backfilled: u64,
        incremental: u64,
        backfill_complete: bool,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        error: String,
    },
}

/// Outcome of one channel pass, with the messages archived before any abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelResult {
    pub channel_id: Snowflake,
    pub name: String,
    pub archived: u64,
    pub outcome: ChannelOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChannel {
    pub channel_id: Snowflake,
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChannel {
    pub channel_id: Snowflake,
    pub name: String,
    pub error: String,
}

/// Aggregated outcome of one guild pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildReport {
    pub guild_id: Snowflake,
    pub name: Option<String>,
    /// Account that ran the pass.
    pub account: String,
    pub messages_archived: u64,
    pub channels_synced: usize,
    pub skipped: Vec<SkippedChannel>,
    pub failed: Vec<FailedChannel>,
    /// Metadata listings that could not be read (for example emoji without permission).
    pub metadata_skipped: Vec<String>,
    /// Guild-level errors (guild unreachable, enumeration failed, store errors).
    pub errors: Vec<String>,
}

impl GuildReport {
    #[must_use]
    pub fn new(guild_id: Snowflake, account: impl Into<String>) -> Self {
        Self {
            guild_id,
            account: account.into(),
            ..Self::default()
        }
    }

    /// Fold one channel's result into the report.
    pub fn record(&mut self, result: ChannelResult) {
        self.messages_archived += result.archived;
        match result.outcome {
            ChannelOutcome::Synced { .. } => self.channels_synced += 1,
            ChannelOutcome::Skipped { reason } => self.skipped.push(SkippedChannel {
                channel_id: result.channel_id,
                name: result.name,
                reason,
            }),
            ChannelOutcome::Failed { error } => self.failed.push(FailedChannel {
                channel_id: result.channel_id,
                name: result.name,
                error,
            }),
        }
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty() || !self.errors.is_empty()
    }
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub guilds: Vec<GuildReport>,
    /// Run-level, non-fatal errors (for example a channel no account can see).
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn absorb(&mut self, report: GuildReport) {
        self.guilds.push(report);
    }

    #[must_use]
    pub fn messages_archived(&self) -> u64 {
        self.guilds.iter().map(|g| g.messages_archived).sum()
    }

    #[must_use]
    pub fn channels_synced(&self) -> usize {
        self.guilds.iter().map(|g| g.channels_synced).sum()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedChannel> {
        self.guilds.iter().flat_map(|g| g.skipped.iter())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FailedChannel> {
        self.guilds.iter().flat_map(|g| g.failed.iter())
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.guilds.iter().any(GuildReport::has_errors)
    }
}

/// Counters for one engine pass over one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Successful page fetches (retries inside the client are not counted).
    pub fetches: u32,
    pub archived: u64,
    /// Backfill only: the pass reached the start of history.
    pub completed: bool,
}

/// Why a channel pass stopped early.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] RepositoryError),

    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Skip reason for errors that mean "not this run" rather than "failed".
    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Api(e) if e.is_forbidden() => Some(SkipReason::Forbidden),
            Self::Cancelled => Some(SkipReason::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub fn short_message(&self) -> String {
        match self {
            Self::Api(e) => short_error_message(e),
            other => other.to_string(),
        }
    }
}

/// An aborted pass together with the progress it made before stopping.
///
/// Everything counted in `partial` is durably persisted and reflected in the
/// checkpoint.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Interrupted {
    pub partial: PassReport,
    #[source]
    pub error: SyncError,
}

impl Interrupted {
    pub fn new(partial: PassReport, error: impl Into<SyncError>) -> Self {
        Self {
            partial,
            error: error.into(),
        }
    }
}

/// Fatal, run-level failures. Nothing has been synced when one is returned.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no accounts configured")]
    NoAccounts,

    #[error("invalid credential for account {account}: {message}")]
    InvalidCredential { account: String, message: String },

    #[error("could not validate account {account}: {source}")]
    Validation {
        account: String,
        #[source]
        source: ApiError,
    },

    #[error("archive store unavailable: {0}")]
    Store(#[from] RepositoryError),
}

//! Checkpointed synchronization.
//!
//! # Module Structure
//!
//! - [`checkpoint`] - The per-channel resumability record and its state machine
//! - [`store`] - Persistence traits the engines write through
//! - [`channels`] - Channel and thread discovery with access classification
//! - [`backfill`] / [`incremental`] - The two message walks
//! - [`coordinator`] - Per-guild orchestration
//! - [`run`] - Credential validation and scope dispatch
//!
//! Every batch is persisted before the checkpoint that reflects it is saved, so
//! a run can stop at any point and the next one resumes without loss.
//!
//! # Example
//!
//! ```ignore
//! use archivist::sync::{Account, SyncOptions, SyncScope, run_sync};
//!
//! let summary = run_sync(&accounts, SyncScope::All, &store, &SyncOptions::default(), None).await?;
//! println!("Archived {} messages", summary.messages_archived());
//! ```

pub mod backfill;
pub mod channels;
pub mod checkpoint;
pub mod coordinator;
pub mod incremental;
mod page;
mod progress;
pub mod run;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use backfill::BackfillEngine;
pub use channels::{ChannelDiscovery, ChannelFetcher, DiscoveredChannel};
pub use checkpoint::{BackfillState, Checkpoint};
pub use coordinator::GuildSyncCoordinator;
pub use incremental::IncrementalEngine;
pub use page::bounds;
pub use progress::{ProgressCallback, SyncPhase, SyncProgress, emit};
pub use run::{Account, run_sync};
pub use store::{ArchiveStore, CheckpointStore};

pub use types::{
    ChannelOutcome, ChannelResult, FailedChannel, GuildReport, Interrupted, PassReport,
    RunError, RunSummary, SkipReason, SkippedChannel, SyncError, SyncOptions, SyncScope,
};

pub use types::{DEFAULT_PAGE_SIZE, DEFAULT_THREAD_PAGE_SIZE};

//! Forward walk from the newest archived message.

use crate::api::{DiscordApi, MessageCursor};
use crate::snowflake::Snowflake;

use super::checkpoint::Checkpoint;
use super::page::{bounds, commit_page};
use super::progress::{ProgressCallback, SyncPhase};
use super::store::ArchiveStore;
use super::types::{Interrupted, PassReport, SyncError, SyncOptions};

/// Fetches messages newer than the checkpoint's newest watermark until caught up.
///
/// A channel with no watermark and an incomplete backfill is seeded with a
/// single page of its latest messages; the backfill engine owns everything
/// older than that.
pub struct IncrementalEngine<'a, A: DiscordApi + ?Sized, S: ArchiveStore + ?Sized> {
    api: &'a A,
    store: &'a S,
    options: &'a SyncOptions,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a, A: DiscordApi + ?Sized, S: ArchiveStore + ?Sized> IncrementalEngine<'a, A, S> {
    pub fn new(api: &'a A, store: &'a S, options: &'a SyncOptions) -> Self {
        Self {
            api,
            store,
            options,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    /// Walk forward until a short page.
    ///
    /// An empty final page still refreshes `last_synced_at` but leaves both
    /// watermarks where they were.
    #[tracing::instrument(skip_all, fields(channel_id = %checkpoint.channel_id()))]
    pub async fn run(&self, checkpoint: &mut Checkpoint) -> Result<PassReport, Interrupted> {
        let mut report = PassReport::default();
        let page_size = self.options.page_size();

        let mut cursor = match (checkpoint.newest(), checkpoint.is_backfill_complete()) {
            (Some(newest), _) => MessageCursor::After(newest),
            // Complete but empty: anything that appears is new.
            (None, true) => MessageCursor::After(Snowflake(0)),
            (None, false) => MessageCursor::Latest,
        };

        loop {
            if self.options.should_stop() {
                return Err(Interrupted::new(report, SyncError::Cancelled));
            }

            let page = self
                .api
                .messages(checkpoint.channel_id(), cursor, page_size)
                .await
                .map_err(|e| Interrupted::new(report, e))?;
            report.fetches += 1;

            let caught_up = page.len() < usize::from(page_size);
            let archived = commit_page(
                self.store,
                checkpoint,
                &page,
                SyncPhase::Incremental,
                false,
                self.on_progress,
            )
            .await
            .map_err(|e| Interrupted::new(report, e))?;
            report.archived += archived;

            let seeded = cursor == MessageCursor::Latest;
            match bounds(&page) {
                Some((_, newest)) if !caught_up && !seeded => {
                    cursor = MessageCursor::After(newest);
                }
                _ => {
                    tracing::debug!(
                        fetches = report.fetches,
                        archived = report.archived,
                        "Incremental caught up"
                    );
                    return Ok(report);
                }
            }
        }
    }
}

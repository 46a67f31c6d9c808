//! Backward walk through a channel's history.

use crate::api::{DiscordApi, MessageCursor};

use super::checkpoint::{BackfillState, Checkpoint};
use super::page::commit_page;
use super::progress::{ProgressCallback, SyncPhase, SyncProgress, emit};
use super::store::ArchiveStore;
use super::types::{Interrupted, PassReport, SyncError, SyncOptions};

/// Walks a channel from its newest message (or from where a previous pass
/// stopped) back to the first message, one page at a time.
///
/// After every page the batch is persisted and then the checkpoint saved, so
/// an interrupted pass resumes at the page after the last one committed.
pub struct BackfillEngine<'a, A: DiscordApi + ?Sized, S: ArchiveStore + ?Sized> {
    api: &'a A,
    store: &'a S,
    options: &'a SyncOptions,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a, A: DiscordApi + ?Sized, S: ArchiveStore + ?Sized> BackfillEngine<'a, A, S> {
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

    /// Run the backward walk until history is exhausted.
    ///
    /// A page shorter than the page size (an empty one included) is the
    /// oldest page, after which the checkpoint is marked complete. A channel
    /// already complete returns immediately without fetching.
    #[tracing::instrument(skip_all, fields(channel_id = %checkpoint.channel_id()))]
    pub async fn run(&self, checkpoint: &mut Checkpoint) -> Result<PassReport, Interrupted> {
        let mut report = PassReport::default();
        let page_size = self.options.page_size();

        loop {
            let cursor = match checkpoint.backfill_state() {
                BackfillState::Complete => {
                    report.completed = true;
                    return Ok(report);
                }
                BackfillState::NotStarted => MessageCursor::Latest,
                BackfillState::InProgress { oldest } => MessageCursor::Before(oldest),
            };

            if self.options.should_stop() {
                return Err(Interrupted::new(report, SyncError::Cancelled));
            }

            let page = self
                .api
                .messages(checkpoint.channel_id(), cursor, page_size)
                .await
                .map_err(|e| Interrupted::new(report, e))?;
            report.fetches += 1;

            let exhausted = page.len() < usize::from(page_size);
            let archived = commit_page(
                self.store,
                checkpoint,
                &page,
                SyncPhase::Backfill,
                exhausted,
                self.on_progress,
            )
            .await
            .map_err(|e| Interrupted::new(report, e))?;
            report.archived += archived;

            if exhausted {
                tracing::debug!(
                    fetches = report.fetches,
                    archived = report.archived,
                    "Backfill complete"
                );
                emit(
                    self.on_progress,
                    SyncProgress::BackfillComplete {
                        channel_id: checkpoint.channel_id(),
                    },
                );
                report.completed = true;
                return Ok(report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snowflake::Snowflake;
    use crate::sync::testing::{FakeApi, MemoryStore};
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    const CHANNEL: u64 = 9;

    fn options(page_size: u8) -> SyncOptions {
        SyncOptions::default().with_page_size(page_size)
    }

    fn fresh() -> Checkpoint {
        Checkpoint::new(Snowflake(CHANNEL), Snowflake(1))
    }

    #[tokio::test]
    async fn test_fetch_count_is_pages_of_history() {
        let api = FakeApi::new(7).with_messages(CHANNEL, 100..=250);
        let store = MemoryStore::new();
        let options = options(50);
        let mut checkpoint = fresh();

        let report = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect("backfill");

        // 151 messages at 50 per page: 50, 50, 50, 1.
        assert_eq!(report.fetches, 4);
        assert_eq!(report.archived, 151);
        assert!(report.completed);
        assert_eq!(checkpoint.oldest(), Some(Snowflake(100)));
        assert_eq!(checkpoint.newest(), Some(Snowflake(250)));
        assert!(checkpoint.is_backfill_complete());
        assert_eq!(store.message_ids(CHANNEL).len(), 151);
        assert_eq!(store.checkpoint(CHANNEL), Some(checkpoint));
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let api = FakeApi::new(7).with_messages(CHANNEL, 1..=100);
        let store = MemoryStore::new();
        let options = options(50);
        let mut checkpoint = fresh();

        let report = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect("backfill");
        assert_eq!(report.fetches, 3);
        assert!(checkpoint.is_backfill_complete());
    }

    #[tokio::test]
    async fn test_empty_channel_completes_on_first_page() {
        let api = FakeApi::new(7);
        let store = MemoryStore::new();
        let options = options(50);
        let mut checkpoint = fresh();

        let report = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect("backfill");
        assert_eq!(report.fetches, 1);
        assert!(checkpoint.is_backfill_complete());
        assert_eq!(checkpoint.oldest(), None);
        assert_eq!(checkpoint.newest(), None);
    }

    #[tokio::test]
    async fn test_complete_checkpoint_is_a_no_op() {
        let api = FakeApi::new(7).with_messages(CHANNEL, 1..=10);
        let store = MemoryStore::new();
        let options = options(50);
        let mut checkpoint = fresh();
        checkpoint.mark_backfill_complete();

        let report = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect("backfill");
        assert_eq!(report.fetches, 0);
        assert!(report.completed);
        assert_eq!(api.message_calls(CHANNEL), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_committed_progress() {
        let api = FakeApi::new(7).with_messages(CHANNEL, 100..=250);
        api.fail_after(CHANNEL, 2);
        let store = MemoryStore::new();
        let options = options(50);
        let mut checkpoint = fresh();

        let interrupted = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect_err("third page fails");
        assert_eq!(interrupted.partial.fetches, 2);
        assert_eq!(interrupted.partial.archived, 100);
        assert!(matches!(interrupted.error, SyncError::Api(ref e) if e.is_transient()));
        assert_eq!(checkpoint.oldest(), Some(Snowflake(151)));
        assert!(!checkpoint.is_backfill_complete());
        assert_eq!(store.checkpoint(CHANNEL), Some(checkpoint.clone()));

        // Resuming continues below the watermark instead of starting over.
        api.clear_failures();
        let report = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect("resume");
        assert_eq!(report.fetches, 2);
        assert_eq!(report.archived, 51);
        assert_eq!(checkpoint.oldest(), Some(Snowflake(100)));
        assert_eq!(store.state().message_writes, 151);
    }

    #[tokio::test]
    async fn test_crash_between_persist_and_checkpoint_is_idempotent() {
        let api = FakeApi::new(7).with_messages(CHANNEL, 100..=250);
        let store = MemoryStore::new();
        // First page's checkpoint is saved, the second page's is not.
        store.fail_checkpoint_saves_after(1);
        let options = options(50);
        let mut checkpoint = fresh();

        let interrupted = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect_err("checkpoint save fails");
        assert!(matches!(interrupted.error, SyncError::Store(_)));
        assert_eq!(checkpoint.oldest(), Some(Snowflake(201)));
        // The second page reached the store even though its checkpoint did not.
        assert_eq!(store.message_ids(CHANNEL).len(), 100);

        store.heal();
        let mut resumed = store.checkpoint(CHANNEL).expect("stored checkpoint");
        BackfillEngine::new(&api, &store, &options)
            .run(&mut resumed)
            .await
            .expect("resume");

        // The second page was fetched again; the archive holds each message once.
        assert_eq!(store.message_ids(CHANNEL).len(), 151);
        assert_eq!(store.state().message_writes, 201);
        assert_eq!(resumed.oldest(), Some(Snowflake(100)));
    }

    #[tokio::test]
    async fn test_checkpoint_watermarks_only_widen() {
        let api = FakeApi::new(7).with_messages(CHANNEL, 100..=250);
        let store = MemoryStore::new();
        let options = options(25);
        let mut checkpoint = fresh();

        BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect("backfill");

        let saves = store.state().saves.clone();
        assert!(saves.len() > 1);
        for pair in saves.windows(2) {
            assert!(pair[1].oldest() <= pair[0].oldest() || pair[0].oldest().is_none());
            assert!(pair[1].newest() >= pair[0].newest());
            assert!(pair[1].is_backfill_complete() >= pair[0].is_backfill_complete());
        }
    }

    #[tokio::test]
    async fn test_stop_flag_cancels_between_pages() {
        let api = FakeApi::new(7).with_messages(CHANNEL, 100..=250);
        let store = MemoryStore::new();
        let stop = Arc::new(AtomicBool::new(true));
        let options = options(50).with_stop_flag(stop);
        let mut checkpoint = fresh();

        let interrupted = BackfillEngine::new(&api, &store, &options)
            .run(&mut checkpoint)
            .await
            .expect_err("cancelled");
        assert!(matches!(interrupted.error, SyncError::Cancelled));
        assert_eq!(api.message_calls(CHANNEL), 0);
    }
}

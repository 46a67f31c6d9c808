//! Committing one fetched page: persist, then advance the checkpoint.

use crate::discord::{ApiMessage, Raw};
use crate::snowflake::Snowflake;

use super::checkpoint::Checkpoint;
use super::progress::{ProgressCallback, SyncPhase, SyncProgress, emit};
use super::store::ArchiveStore;
use super::types::SyncError;

/// Smallest and largest message id on a page.
#[must_use]
pub fn bounds(page: &[Raw<ApiMessage>]) -> Option<(Snowflake, Snowflake)> {
    let min = page.iter().map(|m| m.id).min()?;
    let max = page.iter().map(|m| m.id).max()?;
    Some((min, max))
}

/// Persist `page` and then save the checkpoint widened to cover it.
///
/// The checkpoint is only updated in memory once the save succeeds, so the
/// caller's copy always equals the durable one. An empty page persists nothing
/// but still saves the checkpoint (with `mark_complete` applied).
pub(crate) async fn commit_page<S: ArchiveStore + ?Sized>(
    store: &S,
    checkpoint: &mut Checkpoint,
    page: &[Raw<ApiMessage>],
    phase: SyncPhase,
    mark_complete: bool,
    on_progress: Option<&ProgressCallback>,
) -> Result<u64, SyncError> {
    let mut next = checkpoint.clone();
    let bounds = bounds(page);

    let archived = if page.is_empty() {
        0
    } else {
        let guild_id = page
            .iter()
            .find_map(|m| m.guild_id)
            .or(Some(checkpoint.guild_id()));
        store.persist_messages_batch(guild_id, page).await?
    };

    if let Some((min, max)) = bounds {
        next.record_batch(min, max);
    }
    if mark_complete {
        next.mark_backfill_complete();
    }
    next.touch();
    store.save_checkpoint(&next).await?;
    *checkpoint = next;

    if let Some((oldest, newest)) = bounds {
        tracing::debug!(
            channel_id = %checkpoint.channel_id(),
            %phase,
            count = page.len(),
            %oldest,
            %newest,
            "Batch persisted"
        );
        emit(
            on_progress,
            SyncProgress::BatchPersisted {
                channel_id: checkpoint.channel_id(),
                phase,
                count: page.len(),
                oldest,
                newest,
            },
        );
    }
    Ok(archived)
}

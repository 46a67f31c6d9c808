//! Per-channel resumability record.
//!
//! A [`Checkpoint`] only ever widens: the oldest watermark moves down, the newest
//! moves up, and backfill completion is sticky. Engines mutate it after each batch
//! is durably persisted and then save it, so the stored record never runs ahead of
//! the stored messages.

use chrono::{DateTime, Utc};
use sea_orm::Set;

use crate::entity::prelude::{IngestCheckpointActiveModel, IngestCheckpointModel};
use crate::snowflake::Snowflake;

/// Where a channel's backfill stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillState {
    /// Nothing fetched yet; the first page is the channel's latest messages.
    NotStarted,
    /// Walking backward from `oldest`.
    InProgress { oldest: Snowflake },
    /// History exhausted. Terminal.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    channel_id: Snowflake,
    guild_id: Snowflake,
    oldest: Option<Snowflake>,
    newest: Option<Snowflake>,
    backfill_complete: bool,
    last_synced_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint for a channel with no stored progress.
    #[must_use]
    pub fn new(channel_id: Snowflake, guild_id: Snowflake) -> Self {
        let now = Utc::now();
        Self {
            channel_id,
            guild_id,
            oldest: None,
            newest: None,
            backfill_complete: false,
            last_synced_at: now,
            created_at: now,
        }
    }

    #[must_use]
    pub fn channel_id(&self) -> Snowflake {
        self.channel_id
    }

    #[must_use]
    pub fn guild_id(&self) -> Snowflake {
        self.guild_id
    }

    #[must_use]
    pub fn oldest(&self) -> Option<Snowflake> {
        self.oldest
    }

    #[must_use]
    pub fn newest(&self) -> Option<Snowflake> {
        self.newest
    }

    #[must_use]
    pub fn is_backfill_complete(&self) -> bool {
        self.backfill_complete
    }

    #[must_use]
    pub fn last_synced_at(&self) -> DateTime<Utc> {
        self.last_synced_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn backfill_state(&self) -> BackfillState {
        match (self.backfill_complete, self.oldest) {
            (true, _) => BackfillState::Complete,
            (false, Some(oldest)) => BackfillState::InProgress { oldest },
            (false, None) => BackfillState::NotStarted,
        }
    }

    /// Widen the watermarks to cover a persisted batch spanning `min..=max`.
    pub fn record_batch(&mut self, min: Snowflake, max: Snowflake) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.oldest = Some(self.oldest.map_or(min, |o| o.min(min)));
        self.newest = Some(self.newest.map_or(max, |n| n.max(max)));
    }

    pub fn mark_backfill_complete(&mut self) {
        self.backfill_complete = true;
    }

    pub fn touch(&mut self) {
        self.last_synced_at = Utc::now();
    }

    /// Combine with a stored copy so that saving never moves a watermark backward.
    pub fn merge(&mut self, stored: &Checkpoint) {
        if let Some(oldest) = stored.oldest {
            self.oldest = Some(self.oldest.map_or(oldest, |o| o.min(oldest)));
        }
        if let Some(newest) = stored.newest {
            self.newest = Some(self.newest.map_or(newest, |n| n.max(newest)));
        }
        self.backfill_complete |= stored.backfill_complete;
        self.created_at = self.created_at.min(stored.created_at);
    }

    #[must_use]
    pub fn to_active_model(&self) -> IngestCheckpointActiveModel {
        IngestCheckpointActiveModel {
            channel_id: Set(self.channel_id.as_i64()),
            guild_id: Set(self.guild_id.as_i64()),
            oldest_message_id: Set(self.oldest.map(Snowflake::as_i64)),
            newest_message_id: Set(self.newest.map(Snowflake::as_i64)),
            backfill_complete: Set(self.backfill_complete),
            last_synced_at: Set(self.last_synced_at.fixed_offset()),
            created_at: Set(self.created_at.fixed_offset()),
        }
    }
}

impl From<IngestCheckpointModel> for Checkpoint {
    fn from(model: IngestCheckpointModel) -> Self {
        Self {
            channel_id: Snowflake::from_i64(model.channel_id),
            guild_id: Snowflake::from_i64(model.guild_id),
            oldest: model.oldest_message_id.map(Snowflake::from_i64),
            newest: model.newest_message_id.map(Snowflake::from_i64),
            backfill_complete: model.backfill_complete,
            last_synced_at: model.last_synced_at.with_timezone(&Utc),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint() -> Checkpoint {
        Checkpoint::new(Snowflake(9), Snowflake(1))
    }

    #[test]
    fn test_new_checkpoint_is_not_started() {
        let cp = checkpoint();
        assert_eq!(cp.backfill_state(), BackfillState::NotStarted);
        assert_eq!(cp.oldest(), None);
        assert_eq!(cp.newest(), None);
    }

    #[test]
    fn test_record_batch_only_widens() {
        let mut cp = checkpoint();
        cp.record_batch(Snowflake(200), Snowflake(250));
        assert_eq!(cp.backfill_state(), BackfillState::InProgress {
            oldest: Snowflake(200)
        });

        cp.record_batch(Snowflake(150), Snowflake(199));
        assert_eq!(cp.oldest(), Some(Snowflake(150)));
        assert_eq!(cp.newest(), Some(Snowflake(250)));

        // A re-fetched window inside the range changes nothing.
        cp.record_batch(Snowflake(210), Snowflake(220));
        assert_eq!(cp.oldest(), Some(Snowflake(150)));
        assert_eq!(cp.newest(), Some(Snowflake(250)));

        cp.record_batch(Snowflake(260), Snowflake(251));
        assert_eq!(cp.newest(), Some(Snowflake(260)));
    }

    #[test]
    fn test_backfill_complete_is_sticky() {
        let mut cp = checkpoint();
        cp.mark_backfill_complete();
        cp.record_batch(Snowflake(1), Snowflake(2));
        assert_eq!(cp.backfill_state(), BackfillState::Complete);

        let mut stale = checkpoint();
        stale.merge(&cp);
        assert!(stale.is_backfill_complete());
    }

    #[test]
    fn test_merge_keeps_wider_range() {
        let mut stored = checkpoint();
        stored.record_batch(Snowflake(100), Snowflake(300));

        let mut current = checkpoint();
        current.record_batch(Snowflake(150), Snowflake(400));
        current.merge(&stored);

        assert_eq!(current.oldest(), Some(Snowflake(100)));
        assert_eq!(current.newest(), Some(Snowflake(400)));
    }

    #[test]
    fn test_model_round_trip() {
        let mut cp = checkpoint();
        cp.record_batch(Snowflake(100), Snowflake(250));
        cp.mark_backfill_complete();

        let model = IngestCheckpointModel {
            channel_id: 9,
            guild_id: 1,
            oldest_message_id: Some(100),
            newest_message_id: Some(250),
            backfill_complete: true,
            last_synced_at: cp.last_synced_at().fixed_offset(),
            created_at: cp.created_at().fixed_offset(),
        };
        assert_eq!(Checkpoint::from(model), cp);
    }
}

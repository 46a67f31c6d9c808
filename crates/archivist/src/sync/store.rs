//! The persistence boundary the sync engines write through.

use async_trait::async_trait;

use crate::discord::{
    ApiChannel, ApiEmoji, ApiGuild, ApiMessage, ApiRole, ApiScheduledEvent, ApiSticker, ApiUser,
    Raw,
};
use crate::repository::Result;
use crate::snowflake::Snowflake;

use super::checkpoint::Checkpoint;

/// Durable per-channel progress.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, channel_id: Snowflake) -> Result<Option<Checkpoint>>;

    /// Upsert by channel id. Callers only save after the batch the checkpoint
    /// reflects has been persisted.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Archive writes. Every operation is an idempotent overwrite keyed by the
/// entity's identifier.
#[async_trait]
pub trait ArchiveStore: CheckpointStore {
    /// Cheap connectivity check run before any guild is processed.
    async fn ping(&self) -> Result<()>;

    async fn upsert_guild(&self, guild: &Raw<ApiGuild>) -> Result<()>;

    async fn upsert_roles(&self, guild_id: Snowflake, roles: &[Raw<ApiRole>]) -> Result<u64>;

    async fn upsert_emojis(&self, guild_id: Snowflake, emojis: &[Raw<ApiEmoji>]) -> Result<u64>;

    async fn upsert_stickers(
        &self,
        guild_id: Snowflake,
        stickers: &[Raw<ApiSticker>],
    ) -> Result<u64>;

    async fn upsert_scheduled_events(&self, events: &[Raw<ApiScheduledEvent>]) -> Result<u64>;

    async fn upsert_channels(
        &self,
        guild_id: Option<Snowflake>,
        channels: &[Raw<ApiChannel>],
    ) -> Result<u64>;

    async fn upsert_users(&self, users: &[&Raw<ApiUser>]) -> Result<u64>;

    /// Persist a page of messages with their authors, mentioned users,
    /// attachments and reactions, atomically.
    ///
    /// Re-delivered messages are absorbed; content changes only when a strictly
    /// newer edit timestamp arrives. Returns the number of messages in the batch.
    async fn persist_messages_batch(
        &self,
        guild_id: Option<Snowflake>,
        messages: &[Raw<ApiMessage>],
    ) -> Result<u64>;
}

//! [`ArchiveStore`] over a SeaORM connection.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::discord::{
    ApiChannel, ApiEmoji, ApiGuild, ApiMessage, ApiRole, ApiScheduledEvent, ApiSticker, ApiUser,
    Raw,
};
use crate::retry::{RetryConfig, with_retry};
use crate::snowflake::Snowflake;
use crate::sync::{ArchiveStore, Checkpoint, CheckpointStore, ProgressCallback};

use super::errors::{RepositoryError, Result};
use super::{checkpoint, message, snapshot};

/// Archive store backed by a relational database.
///
/// Every write is retried on lock contention and dropped connections before the
/// error surfaces to the engines.
pub struct SeaOrmStore {
    db: DatabaseConnection,
    retry: RetryConfig,
    progress: Option<Arc<ProgressCallback>>,
}

impl SeaOrmStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            retry: RetryConfig::default(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Report write retries through a progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn retrying<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        with_retry(
            operation,
            &self.retry,
            RepositoryError::is_retryable,
            label,
            self.progress.as_deref(),
        )
        .await
    }
}

impl std::fmt::Debug for SeaOrmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaOrmStore")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CheckpointStore for SeaOrmStore {
    async fn get_checkpoint(&self, channel_id: Snowflake) -> Result<Option<Checkpoint>> {
        let db = &self.db;
        self.retrying("get_checkpoint", || checkpoint::get_checkpoint(db, channel_id))
            .await
    }

    async fn save_checkpoint(&self, cp: &Checkpoint) -> Result<()> {
        let db = &self.db;
        self.retrying("save_checkpoint", || checkpoint::save_checkpoint(db, cp))
            .await
    }
}

#[async_trait]
impl ArchiveStore for SeaOrmStore {
    async fn ping(&self) -> Result<()> {
        Ok(self.db.ping().await?)
    }

    async fn upsert_guild(&self, guild: &Raw<ApiGuild>) -> Result<()> {
        let db = &self.db;
        self.retrying("upsert_guild", || snapshot::upsert_guild(db, guild))
            .await
    }

    async fn upsert_roles(&self, guild_id: Snowflake, roles: &[Raw<ApiRole>]) -> Result<u64> {
        let db = &self.db;
        self.retrying("upsert_roles", || snapshot::upsert_roles(db, guild_id, roles))
            .await
    }

    async fn upsert_emojis(&self, guild_id: Snowflake, emojis: &[Raw<ApiEmoji>]) -> Result<u64> {
        let db = &self.db;
        self.retrying("upsert_emojis", || {
            snapshot::upsert_emojis(db, guild_id, emojis)
        })
        .await
    }

    async fn upsert_stickers(
        &self,
        guild_id: Snowflake,
        stickers: &[Raw<ApiSticker>],
    ) -> Result<u64> {
        let db = &self.db;
        self.retrying("upsert_stickers", || {
            snapshot::upsert_stickers(db, guild_id, stickers)
        })
        .await
    }

    async fn upsert_scheduled_events(&self, events: &[Raw<ApiScheduledEvent>]) -> Result<u64> {
        let db = &self.db;
        self.retrying("upsert_scheduled_events", || {
            snapshot::upsert_scheduled_events(db, events)
        })
        .await
    }

    async fn upsert_channels(
        &self,
        guild_id: Option<Snowflake>,
        channels: &[Raw<ApiChannel>],
    ) -> Result<u64> {
        let db = &self.db;
        self.retrying("upsert_channels", || {
            snapshot::upsert_channels(db, guild_id, channels)
        })
        .await
    }

    async fn upsert_users(&self, users: &[&Raw<ApiUser>]) -> Result<u64> {
        let db = &self.db;
        self.retrying("upsert_users", || snapshot::upsert_users(db, users))
            .await
    }

    async fn persist_messages_batch(
        &self,
        guild_id: Option<Snowflake>,
        messages: &[Raw<ApiMessage>],
    ) -> Result<u64> {
        let db = &self.db;
        self.retrying("persist_messages_batch", || {
            message::persist_messages_batch(db, guild_id, messages)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::prelude::IngestCheckpointModel;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_checkpoint_save_and_load_over_mock_connection() {
        let now = chrono::Utc::now().fixed_offset();
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![IngestCheckpointModel {
                channel_id: 9,
                guild_id: 1,
                oldest_message_id: Some(100),
                newest_message_id: Some(250),
                backfill_complete: true,
                last_synced_at: now,
                created_at: now,
            }]])
            .into_connection();
        let store = SeaOrmStore::new(db).with_retry_config(RetryConfig::default().with_jitter(false));

        let mut checkpoint = Checkpoint::new(Snowflake(9), Snowflake(1));
        checkpoint.record_batch(Snowflake(201), Snowflake(250));
        store.save_checkpoint(&checkpoint).await.expect("save");

        let loaded = store
            .get_checkpoint(Snowflake(9))
            .await
            .expect("load")
            .expect("present");
        assert_eq!(loaded.oldest(), Some(Snowflake(100)));
        assert!(loaded.is_backfill_complete());
    }
}

//! Checkpoint reads and writes.

use std::collections::HashMap;

use sea_orm::sea_query::{Alias, Expr, Func, OnConflict, SimpleExpr};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::entity::prelude::{
    Channel, ChannelColumn, IngestCheckpoint, IngestCheckpointColumn, Message, MessageColumn,
};
use crate::snowflake::Snowflake;
use crate::sync::Checkpoint;

use super::errors::Result;

/// Column of the row already stored.
fn stored(column: IngestCheckpointColumn) -> Expr {
    Expr::col((IngestCheckpoint, column))
}

/// Column of the row being inserted.
fn incoming(column: IngestCheckpointColumn) -> Expr {
    Expr::col((Alias::new("excluded"), column))
}

/// `incoming` when `prefer(incoming, stored)` holds, otherwise whichever is set.
fn widen(column: IngestCheckpointColumn, prefer: fn(Expr, Expr) -> SimpleExpr) -> SimpleExpr {
    Expr::case(prefer(incoming(column), stored(column)), incoming(column))
        .finally(Func::coalesce([stored(column).into(), incoming(column).into()]))
        .into()
}

/// Conflicting saves never narrow the stored row: the oldest watermark keeps the
/// lower value, the newest the higher, and completion stays set once set. Two
/// passes over the same channel may save from stale copies.
pub(crate) fn checkpoint_on_conflict() -> OnConflict {
    use IngestCheckpointColumn as Col;

    OnConflict::column(Col::ChannelId)
        .update_columns([Col::GuildId, Col::LastSyncedAt])
        .value(Col::OldestMessageId, widen(Col::OldestMessageId, |a, b| a.lt(b)))
        .value(Col::NewestMessageId, widen(Col::NewestMessageId, |a, b| a.gt(b)))
        .value(
            Col::BackfillComplete,
            SimpleExpr::from(stored(Col::BackfillComplete))
                .or(incoming(Col::BackfillComplete).into()),
        )
        .to_owned()
}

pub async fn get_checkpoint<C: ConnectionTrait>(
    db: &C,
    channel_id: Snowflake,
) -> Result<Option<Checkpoint>> {
    Ok(IngestCheckpoint::find_by_id(channel_id.as_i64())
        .one(db)
        .await?
        .map(Checkpoint::from))
}

pub async fn save_checkpoint<C: ConnectionTrait>(db: &C, checkpoint: &Checkpoint) -> Result<()> {
    IngestCheckpoint::insert(checkpoint.to_active_model())
        .on_conflict(checkpoint_on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// All checkpoints, optionally for one guild, ordered by guild then channel.
pub async fn list_checkpoints<C: ConnectionTrait>(
    db: &C,
    guild_id: Option<Snowflake>,
) -> Result<Vec<Checkpoint>> {
    let mut query = IngestCheckpoint::find()
        .order_by_asc(IngestCheckpointColumn::GuildId)
        .order_by_asc(IngestCheckpointColumn::ChannelId);
    if let Some(guild_id) = guild_id {
        query = query.filter(IngestCheckpointColumn::GuildId.eq(guild_id.as_i64()));
    }
    Ok(query
        .all(db)
        .await?
        .into_iter()
        .map(Checkpoint::from)
        .collect())
}

/// Stored names of the given channels.
pub async fn channel_names<C: ConnectionTrait>(
    db: &C,
    channel_ids: &[Snowflake],
) -> Result<HashMap<Snowflake, String>> {
    if channel_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, Option<String>)> = Channel::find()
        .select_only()
        .column(ChannelColumn::ChannelId)
        .column(ChannelColumn::Name)
        .filter(ChannelColumn::ChannelId.is_in(channel_ids.iter().map(|id| id.as_i64())))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, name)| name.map(|n| (Snowflake::from_i64(id), n)))
        .collect())
}

/// Number of archived messages in a channel.
pub async fn count_messages<C: ConnectionTrait>(db: &C, channel_id: Snowflake) -> Result<u64> {
    use sea_orm::PaginatorTrait;

    Ok(Message::find()
        .filter(MessageColumn::ChannelId.eq(channel_id.as_i64()))
        .count(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait};

    #[test]
    fn test_checkpoint_upsert_widens_and_preserves_created_at() {
        let cp = Checkpoint::new(Snowflake(9), Snowflake(1));
        let sql = IngestCheckpoint::insert(cp.to_active_model())
            .on_conflict(checkpoint_on_conflict())
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains("ON CONFLICT (\"channel_id\") DO UPDATE"), "{sql}");
        assert!(sql.contains("\"guild_id\" = \"excluded\".\"guild_id\""), "{sql}");
        assert!(!sql.contains("\"created_at\" = \"excluded\""), "{sql}");
        assert!(
            !sql.contains("\"backfill_complete\" = \"excluded\".\"backfill_complete\","),
            "{sql}"
        );
        assert!(sql.contains("CASE WHEN"), "{sql}");
    }

    #[tokio::test]
    async fn test_get_checkpoint_maps_model() {
        let now = chrono::Utc::now().fixed_offset();
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![crate::entity::prelude::IngestCheckpointModel {
                channel_id: 9,
                guild_id: 1,
                oldest_message_id: Some(100),
                newest_message_id: Some(250),
                backfill_complete: true,
                last_synced_at: now,
                created_at: now,
            }]])
            .into_connection();

        let cp = get_checkpoint(&db, Snowflake(9))
            .await
            .unwrap()
            .expect("checkpoint");
        assert_eq!(cp.oldest(), Some(Snowflake(100)));
        assert_eq!(cp.newest(), Some(Snowflake(250)));
        assert!(cp.is_backfill_complete());
    }

    #[tokio::test]
    async fn test_channel_names_empty_input() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        assert!(channel_names(&db, &[]).await.unwrap().is_empty());
    }
}

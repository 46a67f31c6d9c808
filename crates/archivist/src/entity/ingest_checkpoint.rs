//! IngestCheckpoint entity - the durable resumability record, one row per channel.
//!
//! External tooling may read this table to inspect progress; its layout is stable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingest_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel_id: i64,

    pub guild_id: i64,

    /// Oldest archived message id; only ever moves down.
    pub oldest_message_id: Option<i64>,

    /// Newest archived message id; only ever moves up.
    pub newest_message_id: Option<i64>,

    /// Set once the full history has been walked. Never reset by a sync.
    pub backfill_complete: bool,

    pub last_synced_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

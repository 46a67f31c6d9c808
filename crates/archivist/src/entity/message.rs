//! Message entity - append-only message archive.
//!
//! Rows are never deleted. Content, edit timestamp and raw payload are only
//! overwritten when a strictly newer edit timestamp is observed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub message_id: i64,

    pub channel_id: i64,

    /// Denormalized from the channel to avoid joins.
    pub guild_id: Option<i64>,

    pub author_id: i64,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub created_at: DateTimeWithTimeZone,

    pub edited_timestamp: Option<DateTimeWithTimeZone>,

    /// Numeric message type code.
    pub message_type: i32,

    pub tts: bool,

    pub flags: i64,

    pub pinned: bool,

    pub mention_everyone: bool,

    /// Mentioned user ids.
    #[sea_orm(column_type = "Json")]
    pub mentions: Json,

    /// Mentioned role ids.
    #[sea_orm(column_type = "Json")]
    pub mention_roles: Json,

    pub webhook_id: Option<i64>,

    pub referenced_message_id: Option<i64>,

    #[sea_orm(column_type = "Json")]
    pub raw: Json,

    pub archived_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::channel::Entity",
        from = "Column::ChannelId",
        to = "super::channel::Column::ChannelId"
    )]
    Channel,
    #[sea_orm(has_many = "super::attachment::Entity")]
    Attachment,
    #[sea_orm(has_many = "super::reaction::Entity")]
    Reaction,
}

impl Related<super::channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl Related<super::attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachment.def()
    }
}

impl Related<super::reaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Channel entity - guild channels, categories and threads.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel_id: i64,

    pub guild_id: Option<i64>,

    /// Category for channels, parent channel for threads.
    pub parent_id: Option<i64>,

    /// Numeric channel type code.
    pub channel_type: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub topic: Option<String>,

    pub position: Option<i32>,

    pub nsfw: bool,

    #[sea_orm(column_type = "Json")]
    pub permission_overwrites: Json,

    #[sea_orm(column_type = "Json", nullable)]
    pub thread_metadata: Option<Json>,

    pub owner_id: Option<i64>,

    pub last_message_id: Option<i64>,

    #[sea_orm(column_type = "Json")]
    pub raw: Json,

    pub archived_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::guild::Entity",
        from = "Column::GuildId",
        to = "super::guild::Column::GuildId"
    )]
    Guild,
    #[sea_orm(has_many = "super::message::Entity")]
    Message,
}

impl Related<super::guild::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Guild.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

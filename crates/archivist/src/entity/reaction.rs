//! Reaction entity - per-emoji reaction counts on a message.
//!
//! Individual reactors are not tracked; the row is keyed by
//! (message_id, emoji_key) where `emoji_key` is `custom:<id>` or `unicode:<name>`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub message_id: i64,

    #[sea_orm(primary_key, auto_increment = false)]
    pub emoji_key: String,

    pub emoji_id: Option<i64>,

    pub emoji_name: Option<String>,

    pub emoji_animated: bool,

    pub count: i32,

    #[sea_orm(column_type = "Json")]
    pub raw: Json,

    pub archived_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::message::Entity",
        from = "Column::MessageId",
        to = "super::message::Column::MessageId",
        on_delete = "Cascade"
    )]
    Message,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stickers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub sticker_id: i64,

    pub guild_id: Option<i64>,

    pub pack_id: Option<i64>,

    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub tags: Option<String>,

    pub sticker_type: i32,

    pub format_type: i32,

    pub available: Option<bool>,

    pub creator_id: Option<i64>,

    #[sea_orm(column_type = "Json")]
    pub raw: Json,

    pub archived_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guild_scheduled_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: i64,

    pub guild_id: i64,

    pub channel_id: Option<i64>,

    pub creator_id: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub scheduled_start_time: DateTimeWithTimeZone,

    pub scheduled_end_time: Option<DateTimeWithTimeZone>,

    pub privacy_level: i32,

    pub status: i32,

    pub entity_type: i32,

    pub user_count: Option<i32>,

    #[sea_orm(column_type = "Json")]
    pub raw: Json,

    pub archived_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Guild entity - latest-state snapshot of an archived guild.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guilds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    pub icon: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub owner_id: Option<i64>,

    /// Feature flags as a JSON array of strings.
    #[sea_orm(column_type = "Json")]
    pub features: Json,

    pub premium_tier: i32,

    pub preferred_locale: Option<String>,

    pub approximate_member_count: Option<i32>,

    /// Full API payload.
    #[sea_orm(column_type = "Json")]
    pub raw: Json,

    /// First time this guild was archived.
    pub archived_at: DateTimeWithTimeZone,

    /// Last time the snapshot was refreshed.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::channel::Entity")]
    Channel,
    #[sea_orm(has_many = "super::role::Entity")]
    Role,
}

impl Related<super::channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emojis")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub emoji_id: i64,

    pub guild_id: i64,

    pub name: Option<String>,

    pub animated: bool,

    pub available: bool,

    pub managed: bool,

    pub require_colons: bool,

    /// Role ids allowed to use the emoji.
    #[sea_orm(column_type = "Json")]
    pub roles: Json,

    /// Uploader, when the credential may see it.
    pub creator_id: Option<i64>,

    #[sea_orm(column_type = "Json")]
    pub raw: Json,

    pub archived_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

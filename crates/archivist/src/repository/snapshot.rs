//! Latest-state upserts for guild-level entities and users.
//!
//! Each statement is a single `INSERT ... ON CONFLICT (pk) DO UPDATE` that rewrites
//! every column except the key and `archived_at`, so the first-seen time survives
//! while everything else tracks the server.

use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait};

use crate::discord::{
    ApiChannel, ApiEmoji, ApiGuild, ApiRole, ApiScheduledEvent, ApiSticker, ApiUser, Raw,
};
use crate::entity::prelude::{
    Channel, ChannelColumn, Emoji, EmojiColumn, Guild, GuildColumn, Role, RoleColumn,
    ScheduledEvent, ScheduledEventColumn, Sticker, StickerColumn, User, UserColumn,
};
use crate::snowflake::Snowflake;

use super::errors::Result;

pub(crate) fn guild_on_conflict() -> OnConflict {
    OnConflict::column(GuildColumn::GuildId)
        .update_columns([
            GuildColumn::Name,
            GuildColumn::Icon,
            GuildColumn::Description,
            GuildColumn::OwnerId,
            GuildColumn::Features,
            GuildColumn::PremiumTier,
            GuildColumn::PreferredLocale,
            GuildColumn::ApproximateMemberCount,
            GuildColumn::Raw,
            GuildColumn::UpdatedAt,
        ])
        .to_owned()
}

pub(crate) fn role_on_conflict() -> OnConflict {
    OnConflict::column(RoleColumn::RoleId)
        .update_columns([
            RoleColumn::GuildId,
            RoleColumn::Name,
            RoleColumn::Color,
            RoleColumn::Hoist,
            RoleColumn::Position,
            RoleColumn::Permissions,
            RoleColumn::Managed,
            RoleColumn::Mentionable,
            RoleColumn::Raw,
            RoleColumn::UpdatedAt,
        ])
        .to_owned()
}

pub(crate) fn emoji_on_conflict() -> OnConflict {
    OnConflict::column(EmojiColumn::EmojiId)
        .update_columns([
            EmojiColumn::GuildId,
            EmojiColumn::Name,
            EmojiColumn::Animated,
            EmojiColumn::Available,
            EmojiColumn::Managed,
            EmojiColumn::RequireColons,
            EmojiColumn::Roles,
            EmojiColumn::CreatorId,
            EmojiColumn::Raw,
            EmojiColumn::UpdatedAt,
        ])
        .to_owned()
}

pub(crate) fn sticker_on_conflict() -> OnConflict {
    OnConflict::column(StickerColumn::StickerId)
        .update_columns([
            StickerColumn::GuildId,
            StickerColumn::PackId,
            StickerColumn::Name,
            StickerColumn::Description,
            StickerColumn::Tags,
            StickerColumn::StickerType,
            StickerColumn::FormatType,
            StickerColumn::Available,
            StickerColumn::CreatorId,
            StickerColumn::Raw,
            StickerColumn::UpdatedAt,
        ])
        .to_owned()
}

pub(crate) fn scheduled_event_on_conflict() -> OnConflict {
    OnConflict::column(ScheduledEventColumn::EventId)
        .update_columns([
            ScheduledEventColumn::GuildId,
            ScheduledEventColumn::ChannelId,
            ScheduledEventColumn::CreatorId,
            ScheduledEventColumn::Name,
            ScheduledEventColumn::Description,
            ScheduledEventColumn::ScheduledStartTime,
            ScheduledEventColumn::ScheduledEndTime,
            ScheduledEventColumn::PrivacyLevel,
            ScheduledEventColumn::Status,
            ScheduledEventColumn::EntityType,
            ScheduledEventColumn::UserCount,
            ScheduledEventColumn::Raw,
            ScheduledEventColumn::UpdatedAt,
        ])
        .to_owned()
}

pub(crate) fn channel_on_conflict() -> OnConflict {
    OnConflict::column(ChannelColumn::ChannelId)
        .update_columns([
            ChannelColumn::GuildId,
            ChannelColumn::ParentId,
            ChannelColumn::ChannelType,
            ChannelColumn::Name,
            ChannelColumn::Topic,
            ChannelColumn::Position,
            ChannelColumn::Nsfw,
            ChannelColumn::PermissionOverwrites,
            ChannelColumn::ThreadMetadata,
            ChannelColumn::OwnerId,
            ChannelColumn::LastMessageId,
            ChannelColumn::Raw,
            ChannelColumn::UpdatedAt,
        ])
        .to_owned()
}

pub(crate) fn user_on_conflict() -> OnConflict {
    OnConflict::column(UserColumn::UserId)
        .update_columns([
            UserColumn::Username,
            UserColumn::Discriminator,
            UserColumn::GlobalName,
            UserColumn::Avatar,
            UserColumn::Bot,
            UserColumn::System,
            UserColumn::PublicFlags,
            UserColumn::Raw,
            UserColumn::UpdatedAt,
        ])
        .to_owned()
}

pub async fn upsert_guild<C: ConnectionTrait>(db: &C, guild: &Raw<ApiGuild>) -> Result<()> {
    Guild::insert(guild.to_active_model())
        .on_conflict(guild_on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub async fn upsert_roles<C: ConnectionTrait>(
    db: &C,
    guild_id: Snowflake,
    roles: &[Raw<ApiRole>],
) -> Result<u64> {
    if roles.is_empty() {
        return Ok(0);
    }
    let models = roles.iter().map(|r| r.to_active_model(guild_id));
    Ok(Role::insert_many(models)
        .on_conflict(role_on_conflict())
        .exec_without_returning(db)
        .await?)
}

pub async fn upsert_emojis<C: ConnectionTrait>(
    db: &C,
    guild_id: Snowflake,
    emojis: &[Raw<ApiEmoji>],
) -> Result<u64> {
    let models: Vec<_> = emojis
        .iter()
        .filter_map(|e| e.to_active_model(guild_id))
        .collect();
    if models.is_empty() {
        return Ok(0);
    }
    Ok(Emoji::insert_many(models)
        .on_conflict(emoji_on_conflict())
        .exec_without_returning(db)
        .await?)
}

pub async fn upsert_stickers<C: ConnectionTrait>(
    db: &C,
    guild_id: Snowflake,
    stickers: &[Raw<ApiSticker>],
) -> Result<u64> {
    if stickers.is_empty() {
        return Ok(0);
    }
    let models = stickers.iter().map(|s| s.to_active_model(guild_id));
    Ok(Sticker::insert_many(models)
        .on_conflict(sticker_on_conflict())
        .exec_without_returning(db)
        .await?)
}

pub async fn upsert_scheduled_events<C: ConnectionTrait>(
    db: &C,
    events: &[Raw<ApiScheduledEvent>],
) -> Result<u64> {
    if events.is_empty() {
        return Ok(0);
    }
    let models = events.iter().map(Raw::<ApiScheduledEvent>::to_active_model);
    Ok(ScheduledEvent::insert_many(models)
        .on_conflict(scheduled_event_on_conflict())
        .exec_without_returning(db)
        .await?)
}

pub async fn upsert_channels<C: ConnectionTrait>(
    db: &C,
    guild_id: Option<Snowflake>,
    channels: &[Raw<ApiChannel>],
) -> Result<u64> {
    if channels.is_empty() {
        return Ok(0);
    }
    let models = channels.iter().map(|c| c.to_active_model(guild_id));
    Ok(Channel::insert_many(models)
        .on_conflict(channel_on_conflict())
        .exec_without_returning(db)
        .await?)
}

/// Upsert users. Callers deduplicate by id first: a statement may not touch the
/// same row twice.
pub async fn upsert_users<C: ConnectionTrait>(db: &C, users: &[&Raw<ApiUser>]) -> Result<u64> {
    if users.is_empty() {
        return Ok(0);
    }
    let models = users.iter().map(|u| u.to_active_model());
    Ok(User::insert_many(models)
        .on_conflict(user_on_conflict())
        .exec_without_returning(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};
    use serde_json::json;

    fn guild() -> Raw<ApiGuild> {
        serde_json::from_value(json!({"id": "1", "name": "Rustaceans", "features": ["COMMUNITY"]}))
            .unwrap()
    }

    #[test]
    fn test_guild_upsert_sql_keeps_archived_at() {
        let sql = Guild::insert(guild().to_active_model())
            .on_conflict(guild_on_conflict())
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains("ON CONFLICT (\"guild_id\") DO UPDATE"), "{sql}");
        assert!(sql.contains("\"updated_at\" = \"excluded\".\"updated_at\""), "{sql}");
        assert!(!sql.contains("\"archived_at\" = \"excluded\""), "{sql}");
    }

    #[test]
    fn test_user_upsert_sql_postgres() {
        let user: Raw<ApiUser> = serde_json::from_value(json!({"id": "5", "username": "a"})).unwrap();
        let sql = User::insert(user.to_active_model())
            .on_conflict(user_on_conflict())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("ON CONFLICT (\"user_id\") DO UPDATE"), "{sql}");
    }

    #[tokio::test]
    async fn test_empty_lists_issue_no_statements() {
        // No exec results are queued: any statement would fail.
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        assert_eq!(upsert_roles(&db, Snowflake(1), &[]).await.unwrap(), 0);
        assert_eq!(upsert_channels(&db, None, &[]).await.unwrap(), 0);
        assert_eq!(upsert_users(&db, &[]).await.unwrap(), 0);
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_emojis_without_id_are_dropped() {
        let emojis: Vec<Raw<ApiEmoji>> =
            serde_json::from_value(json!([{"id": null, "name": "x"}])).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        assert_eq!(upsert_emojis(&db, Snowflake(1), &emojis).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_guild_upsert_executes_one_statement() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        upsert_guild(&db, &guild()).await.unwrap();
        assert_eq!(db.into_transaction_log().len(), 1);
    }
}

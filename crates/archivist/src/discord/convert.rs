//! Conversion from API payloads to database active models.
//!
//! Every row keeps the payload's raw JSON. Postgres rejects `\u0000` in both text
//! and JSON columns, so NUL characters are stripped on the way in.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::Set;
use serde_json::{Value, json};

use crate::entity::prelude::{
    AttachmentActiveModel, ChannelActiveModel, EmojiActiveModel, GuildActiveModel,
    MessageActiveModel, ReactionActiveModel, RoleActiveModel, ScheduledEventActiveModel,
    StickerActiveModel, UserActiveModel,
};
use crate::snowflake::Snowflake;

use super::types::{
    ApiAttachment, ApiChannel, ApiEmoji, ApiGuild, ApiMessage, ApiReaction, ApiRole,
    ApiScheduledEvent, ApiSticker, ApiUser, Raw,
};

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

/// Remove NUL characters from a string.
#[must_use]
pub fn strip_nul(text: &str) -> String {
    if text.contains('\0') {
        text.replace('\0', "")
    } else {
        text.to_string()
    }
}

fn strip_nul_opt(text: Option<&String>) -> Option<String> {
    text.map(|t| strip_nul(t))
}

/// Recursively remove NUL characters from every string (and key) of a JSON value.
#[must_use]
pub fn strip_nul_json(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_nul(s)),
        Value::Array(items) => Value::Array(items.iter().map(strip_nul_json).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (strip_nul(k), strip_nul_json(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn ids_json(ids: impl IntoIterator<Item = Snowflake>) -> Value {
    Value::Array(ids.into_iter().map(|id| json!(id.to_string())).collect())
}

fn raw_field(raw: &Value, key: &str, default: Value) -> Value {
    raw.get(key)
        .filter(|v| !v.is_null())
        .map_or(default, strip_nul_json)
}

impl Raw<ApiGuild> {
    pub fn to_active_model(&self) -> GuildActiveModel {
        let now = now();
        GuildActiveModel {
            guild_id: Set(self.id.as_i64()),
            name: Set(strip_nul(&self.name)),
            icon: Set(self.icon.clone()),
            description: Set(strip_nul_opt(self.description.as_ref())),
            owner_id: Set(self.owner_id.map(Snowflake::as_i64)),
            features: Set(json!(self.features)),
            premium_tier: Set(self.premium_tier),
            preferred_locale: Set(self.preferred_locale.clone()),
            approximate_member_count: Set(self.approximate_member_count),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        }
    }
}

/// Roles, emojis, stickers and scheduled events are listed per guild and carry
/// the guild id only implicitly.
impl Raw<ApiRole> {
    pub fn to_active_model(&self, guild_id: Snowflake) -> RoleActiveModel {
        let now = now();
        RoleActiveModel {
            role_id: Set(self.id.as_i64()),
            guild_id: Set(guild_id.as_i64()),
            name: Set(strip_nul(&self.name)),
            color: Set(self.color),
            hoist: Set(self.hoist),
            position: Set(self.position),
            permissions: Set(self.permissions.0.to_string()),
            managed: Set(self.managed),
            mentionable: Set(self.mentionable),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl Raw<ApiEmoji> {
    /// `None` for payloads without an id (unicode emoji never appear in guild
    /// listings, but the field is nullable on the wire).
    pub fn to_active_model(&self, guild_id: Snowflake) -> Option<EmojiActiveModel> {
        let id = self.id?;
        let now = now();
        Some(EmojiActiveModel {
            emoji_id: Set(id.as_i64()),
            guild_id: Set(guild_id.as_i64()),
            name: Set(strip_nul_opt(self.name.as_ref())),
            animated: Set(self.animated),
            available: Set(self.available.unwrap_or(true)),
            managed: Set(self.managed),
            require_colons: Set(self.require_colons.unwrap_or(true)),
            roles: Set(ids_json(self.roles.iter().copied())),
            creator_id: Set(self.user.as_ref().map(|u| u.id.as_i64())),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        })
    }
}

impl Raw<ApiSticker> {
    pub fn to_active_model(&self, guild_id: Snowflake) -> StickerActiveModel {
        let now = now();
        StickerActiveModel {
            sticker_id: Set(self.id.as_i64()),
            guild_id: Set(Some(self.guild_id.unwrap_or(guild_id).as_i64())),
            pack_id: Set(self.pack_id.map(Snowflake::as_i64)),
            name: Set(strip_nul(&self.name)),
            description: Set(strip_nul_opt(self.description.as_ref())),
            tags: Set(strip_nul_opt(self.tags.as_ref())),
            sticker_type: Set(self.kind),
            format_type: Set(self.format_type),
            available: Set(self.available),
            creator_id: Set(self.user.as_ref().map(|u| u.id.as_i64())),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl Raw<ApiScheduledEvent> {
    pub fn to_active_model(&self) -> ScheduledEventActiveModel {
        let now = now();
        ScheduledEventActiveModel {
            event_id: Set(self.id.as_i64()),
            guild_id: Set(self.guild_id.as_i64()),
            channel_id: Set(self.channel_id.map(Snowflake::as_i64)),
            creator_id: Set(self.creator_id.map(Snowflake::as_i64)),
            name: Set(strip_nul(&self.name)),
            description: Set(strip_nul_opt(self.description.as_ref())),
            scheduled_start_time: Set(self.scheduled_start_time.fixed_offset()),
            scheduled_end_time: Set(self.scheduled_end_time.map(|t| t.fixed_offset())),
            privacy_level: Set(self.privacy_level),
            status: Set(self.status),
            entity_type: Set(self.entity_type),
            user_count: Set(self.user_count),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl Raw<ApiChannel> {
    /// Threads fetched through a per-channel listing may omit `guild_id`; the
    /// caller supplies the guild they were discovered in.
    pub fn to_active_model(&self, guild_id: Option<Snowflake>) -> ChannelActiveModel {
        let now = now();
        ChannelActiveModel {
            channel_id: Set(self.id.as_i64()),
            guild_id: Set(self.guild_id.or(guild_id).map(Snowflake::as_i64)),
            parent_id: Set(self.parent_id.map(Snowflake::as_i64)),
            channel_type: Set(self.kind.code()),
            name: Set(strip_nul_opt(self.name.as_ref())),
            topic: Set(strip_nul_opt(self.topic.as_ref())),
            position: Set(self.position),
            nsfw: Set(self.nsfw),
            permission_overwrites: Set(raw_field(&self.raw, "permission_overwrites", json!([]))),
            thread_metadata: Set(self
                .raw
                .get("thread_metadata")
                .filter(|v| !v.is_null())
                .map(strip_nul_json)),
            owner_id: Set(self.owner_id.map(Snowflake::as_i64)),
            last_message_id: Set(self.last_message_id.map(Snowflake::as_i64)),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl Raw<ApiUser> {
    pub fn to_active_model(&self) -> UserActiveModel {
        let now = now();
        UserActiveModel {
            user_id: Set(self.id.as_i64()),
            username: Set(strip_nul_opt(self.username.as_ref())),
            discriminator: Set(self.discriminator.clone()),
            global_name: Set(strip_nul_opt(self.global_name.as_ref())),
            avatar: Set(self.avatar.clone()),
            bot: Set(self.bot),
            system: Set(self.system),
            public_flags: Set(self.public_flags),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl Raw<ApiAttachment> {
    pub fn to_active_model(&self, message_id: Snowflake) -> AttachmentActiveModel {
        AttachmentActiveModel {
            attachment_id: Set(self.id.as_i64()),
            message_id: Set(message_id.as_i64()),
            filename: Set(strip_nul(&self.filename)),
            description: Set(strip_nul_opt(self.description.as_ref())),
            content_type: Set(self.content_type.clone()),
            size: Set(self.size),
            url: Set(self.url.clone()),
            proxy_url: Set(self.proxy_url.clone()),
            height: Set(self.height),
            width: Set(self.width),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now()),
        }
    }
}

impl Raw<ApiReaction> {
    pub fn to_active_model(&self, message_id: Snowflake) -> ReactionActiveModel {
        let now = now();
        ReactionActiveModel {
            message_id: Set(message_id.as_i64()),
            emoji_key: Set(strip_nul(&self.emoji.key())),
            emoji_id: Set(self.emoji.id.map(Snowflake::as_i64)),
            emoji_name: Set(strip_nul_opt(self.emoji.name.as_ref())),
            emoji_animated: Set(self.emoji.animated),
            count: Set(self.count),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl Raw<ApiMessage> {
    /// `guild_id` fills in for payloads that omit it (messages fetched over REST
    /// usually do).
    pub fn to_active_model(&self, guild_id: Option<Snowflake>) -> MessageActiveModel {
        MessageActiveModel {
            message_id: Set(self.id.as_i64()),
            channel_id: Set(self.channel_id.as_i64()),
            guild_id: Set(self.guild_id.or(guild_id).map(Snowflake::as_i64)),
            author_id: Set(self.author.id.as_i64()),
            content: Set(strip_nul(&self.content)),
            created_at: Set(self.timestamp.fixed_offset()),
            edited_timestamp: Set(self.edited_timestamp.map(|t| t.fixed_offset())),
            message_type: Set(self.kind),
            tts: Set(self.tts),
            flags: Set(self.flags),
            pinned: Set(self.pinned),
            mention_everyone: Set(self.mention_everyone),
            mentions: Set(ids_json(self.mentions.iter().map(|u| u.id))),
            mention_roles: Set(ids_json(self.mention_roles.iter().copied())),
            webhook_id: Set(self.webhook_id.map(Snowflake::as_i64)),
            referenced_message_id: Set(self
                .message_reference
                .as_ref()
                .and_then(|r| r.message_id)
                .map(Snowflake::as_i64)),
            raw: Set(strip_nul_json(&self.raw)),
            archived_at: Set(now()),
        }
    }
}

/// Every distinct user referenced by a page of messages (authors and mentions).
///
/// When a user appears more than once the payload seen last wins; ordering of the
/// result is by user id.
#[must_use]
pub fn collect_users(messages: &[Raw<ApiMessage>]) -> Vec<&Raw<ApiUser>> {
    let mut users: BTreeMap<Snowflake, &Raw<ApiUser>> = BTreeMap::new();
    for message in messages {
        users.insert(message.author.id, &message.author);
        for mention in &message.mentions {
            users.insert(mention.id, mention);
        }
    }
    users.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveValue;

    fn message(value: Value) -> Raw<ApiMessage> {
        serde_json::from_value(value).unwrap()
    }

    fn set<T: Into<sea_orm::Value>>(value: ActiveValue<T>) -> T {
        match value {
            ActiveValue::Set(v) | ActiveValue::Unchanged(v) => v,
            ActiveValue::NotSet => panic!("value not set"),
        }
    }

    #[test]
    fn test_strip_nul() {
        assert_eq!(strip_nul("a\0b"), "ab");
        assert_eq!(strip_nul("clean"), "clean");
        assert_eq!(
            strip_nul_json(&json!({"k\0": ["x\0y", 1, null]})),
            json!({"k": ["xy", 1, null]})
        );
    }

    #[test]
    fn test_message_to_active_model() {
        let msg = message(json!({
            "id": "100",
            "channel_id": "9",
            "author": {"id": "5"},
            "content": "hello\u{0000} world",
            "timestamp": "2024-01-01T00:00:00+00:00",
            "mentions": [{"id": "6"}],
            "mention_roles": ["44"],
            "message_reference": {"message_id": "90"}
        }));
        let model = msg.to_active_model(Some(Snowflake(1)));

        assert_eq!(set(model.message_id), 100);
        assert_eq!(set(model.guild_id), Some(1));
        assert_eq!(set(model.author_id), 5);
        assert_eq!(set(model.content), "hello world");
        assert_eq!(set(model.mentions), json!(["6"]));
        assert_eq!(set(model.mention_roles), json!(["44"]));
        assert_eq!(set(model.referenced_message_id), Some(90));
        assert!(set(model.edited_timestamp).is_none());
    }

    #[test]
    fn test_payload_guild_id_wins_over_fallback() {
        let msg = message(json!({
            "id": "100", "channel_id": "9", "guild_id": "3",
            "author": {"id": "5"}, "timestamp": "2024-01-01T00:00:00+00:00"
        }));
        assert_eq!(set(msg.to_active_model(Some(Snowflake(1))).guild_id), Some(3));
    }

    #[test]
    fn test_collect_users_deduplicates() {
        let page = vec![
            message(json!({
                "id": "2", "channel_id": "9", "author": {"id": "5", "username": "old"},
                "timestamp": "2024-01-01T00:00:00+00:00", "mentions": [{"id": "6"}]
            })),
            message(json!({
                "id": "1", "channel_id": "9", "author": {"id": "5", "username": "new"},
                "timestamp": "2024-01-01T00:00:00+00:00"
            })),
        ];
        let users = collect_users(&page);
        let ids: Vec<_> = users.iter().map(|u| u.id.get()).collect();
        assert_eq!(ids, vec![5, 6]);
        assert_eq!(users[0].username.as_deref(), Some("new"));
    }

    #[test]
    fn test_emoji_without_id_is_skipped() {
        let emoji: Raw<ApiEmoji> = serde_json::from_value(json!({"id": null, "name": "x"})).unwrap();
        assert!(emoji.to_active_model(Snowflake(1)).is_none());
    }

    #[test]
    fn test_reaction_key_and_count() {
        let reaction: Raw<ApiReaction> =
            serde_json::from_value(json!({"count": 3, "emoji": {"id": "55", "name": "party"}}))
                .unwrap();
        let model = reaction.to_active_model(Snowflake(100));
        assert_eq!(set(model.emoji_key), "custom:55");
        assert_eq!(set(model.count), 3);
        assert_eq!(set(model.message_id), 100);
    }

    #[test]
    fn test_thread_keeps_metadata_and_fallback_guild() {
        let thread: Raw<ApiChannel> = serde_json::from_value(json!({
            "id": "77", "type": 11, "parent_id": "9",
            "thread_metadata": {"archived": true, "archive_timestamp": "2024-02-01T00:00:00+00:00"}
        }))
        .unwrap();
        let model = thread.to_active_model(Some(Snowflake(1)));
        assert_eq!(set(model.guild_id), Some(1));
        assert_eq!(set(model.channel_type), 11);
        assert_eq!(
            set(model.thread_metadata).and_then(|m| m.get("archived").cloned()),
            Some(json!(true))
        );
        assert_eq!(set(model.permission_overwrites), json!([]));
    }
}

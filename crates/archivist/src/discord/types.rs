use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::permissions::Permissions;
use crate::snowflake::Snowflake;

/// A decoded payload together with the untouched JSON it came from.
///
/// The typed view only names the fields the archiver reads; everything else the
/// server sends (including fields added by future API versions) survives in `raw`
/// and is persisted alongside the typed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw<T> {
    pub data: T,
    pub raw: Value,
}

impl<T: DeserializeOwned> Raw<T> {
    /// Decode `raw` into its typed view, keeping the original value.
    pub fn from_value(raw: Value) -> serde_json::Result<Self> {
        let data = T::deserialize(&raw)?;
        Ok(Self { data, raw })
    }
}

impl<T> Deref for Raw<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Raw<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(serde::de::Error::custom)
    }
}

// ─── Channel types ──────────────────────────────────────────────────────────

/// Channel type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "i32")]
pub enum ChannelType {
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildAnnouncement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    GuildStageVoice,
    GuildDirectory,
    GuildForum,
    GuildMedia,
    Unknown(i32),
}

impl From<i32> for ChannelType {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::GuildStageVoice,
            14 => Self::GuildDirectory,
            15 => Self::GuildForum,
            16 => Self::GuildMedia,
            other => Self::Unknown(other),
        }
    }
}

impl ChannelType {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::GuildText => 0,
            Self::Dm => 1,
            Self::GuildVoice => 2,
            Self::GroupDm => 3,
            Self::GuildCategory => 4,
            Self::GuildAnnouncement => 5,
            Self::AnnouncementThread => 10,
            Self::PublicThread => 11,
            Self::PrivateThread => 12,
            Self::GuildStageVoice => 13,
            Self::GuildDirectory => 14,
            Self::GuildForum => 15,
            Self::GuildMedia => 16,
            Self::Unknown(code) => code,
        }
    }

    /// Channels that carry a message history (voice and stage have text chat).
    #[must_use]
    pub fn has_messages(self) -> bool {
        matches!(
            self,
            Self::GuildText
                | Self::Dm
                | Self::GuildVoice
                | Self::GroupDm
                | Self::GuildAnnouncement
                | Self::AnnouncementThread
                | Self::PublicThread
                | Self::PrivateThread
                | Self::GuildStageVoice
        )
    }

    #[must_use]
    pub fn is_thread(self) -> bool {
        matches!(
            self,
            Self::AnnouncementThread | Self::PublicThread | Self::PrivateThread
        )
    }

    /// Parents whose archived threads can be listed.
    #[must_use]
    pub fn has_threads(self) -> bool {
        matches!(
            self,
            Self::GuildText | Self::GuildAnnouncement | Self::GuildForum | Self::GuildMedia
        )
    }

    /// Forum and media posts are always public threads.
    #[must_use]
    pub fn has_private_threads(self) -> bool {
        matches!(self, Self::GuildText | Self::GuildAnnouncement)
    }

    /// Voice-style channels additionally need CONNECT to be read.
    #[must_use]
    pub fn requires_connect(self) -> bool {
        matches!(self, Self::GuildVoice | Self::GuildStageVoice)
    }
}

// ─── Users and members ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiUser {
    pub id: Snowflake,
    pub username: Option<String>,
    pub discriminator: Option<String>,
    pub global_name: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub public_flags: i64,
}

/// The current credential's membership in a guild.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiMember {
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    pub user: Option<ApiUser>,
    pub nick: Option<String>,
}

// ─── Guild-level entities ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiGuild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub premium_tier: i32,
    pub preferred_locale: Option<String>,
    pub approximate_member_count: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiRole {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: i64,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiEmoji {
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
    pub available: Option<bool>,
    #[serde(default)]
    pub managed: bool,
    pub require_colons: Option<bool>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    pub user: Option<ApiUser>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiSticker {
    pub id: Snowflake,
    pub pack_id: Option<Snowflake>,
    pub guild_id: Option<Snowflake>,
    pub name: String,
    pub description: Option<String>,
    pub tags: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub format_type: i32,
    pub available: Option<bool>,
    pub user: Option<ApiUser>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiScheduledEvent {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub channel_id: Option<Snowflake>,
    pub creator_id: Option<Snowflake>,
    pub name: String,
    pub description: Option<String>,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub privacy_level: i32,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub entity_type: i32,
    pub user_count: Option<i32>,
}

// ─── Channels and threads ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i32")]
pub enum OverwriteKind {
    Role,
    Member,
}

impl From<i32> for OverwriteKind {
    fn from(code: i32) -> Self {
        if code == 1 { Self::Member } else { Self::Role }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PermissionOverwrite {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub archived: bool,
    /// Kept verbatim: it is echoed back as the `before` cursor of thread listings.
    pub archive_timestamp: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiChannel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    pub guild_id: Option<Snowflake>,
    pub parent_id: Option<Snowflake>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub position: Option<i32>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
    pub last_message_id: Option<Snowflake>,
    pub owner_id: Option<Snowflake>,
    pub thread_metadata: Option<ThreadMetadata>,
}

impl ApiChannel {
    /// Human-readable label for logs and summaries.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("#{name}"),
            None => self.id.to_string(),
        }
    }
}

/// One page of an archived-thread listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadPage {
    #[serde(default)]
    pub threads: Vec<Raw<ApiChannel>>,
    #[serde(default)]
    pub has_more: bool,
}

/// Guild-wide active thread listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActiveThreads {
    #[serde(default)]
    pub threads: Vec<Raw<ApiChannel>>,
}

// ─── Messages ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiAttachment {
    pub id: Snowflake,
    pub filename: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: i64,
    pub url: String,
    pub proxy_url: Option<String>,
    pub height: Option<i32>,
    pub width: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReactionEmoji {
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

impl ReactionEmoji {
    /// Stable identity of a reaction emoji: custom emoji by id, unicode by name.
    #[must_use]
    pub fn key(&self) -> String {
        match (&self.id, &self.name) {
            (Some(id), _) => format!("custom:{id}"),
            (None, Some(name)) => format!("unicode:{name}"),
            (None, None) => "unicode:".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiReaction {
    #[serde(default)]
    pub count: i32,
    pub emoji: ReactionEmoji,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageReference {
    pub message_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiMessage {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: Raw<ApiUser>,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub flags: i64,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<Raw<ApiUser>>,
    #[serde(default)]
    pub mention_roles: Vec<Snowflake>,
    #[serde(default)]
    pub attachments: Vec<Raw<ApiAttachment>>,
    #[serde(default)]
    pub reactions: Vec<Raw<ApiReaction>>,
    pub webhook_id: Option<Snowflake>,
    pub message_reference: Option<MessageReference>,
}

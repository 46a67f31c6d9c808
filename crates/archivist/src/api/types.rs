use async_trait::async_trait;

use crate::discord::{
    ApiChannel, ApiEmoji, ApiGuild, ApiMember, ApiMessage, ApiRole, ApiScheduledEvent, ApiSticker,
    ApiUser, Raw, ThreadPage,
};
use crate::snowflake::Snowflake;

use super::errors::Result;

/// Maximum page size the server accepts for message and thread listings.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Position from which a message listing starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCursor {
    /// The most recent messages in the channel.
    Latest,
    /// Messages strictly older than the given id, newest first.
    Before(Snowflake),
    /// Messages strictly newer than the given id.
    After(Snowflake),
}

/// Which archived threads to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadVisibility {
    Public,
    Private,
}

/// Read-only view of the remote API used by the sync layer.
///
/// [`crate::discord::DiscordClient`] implements this over a
/// [`super::RateLimitedClient`]; tests substitute in-memory fakes. Every method
/// follows the client's retry contract, so callers only see the outcomes listed
/// on [`super::ApiError`].
#[async_trait]
pub trait DiscordApi: Send + Sync {
    /// The user behind the credential. Also used to validate the credential.
    async fn current_user(&self) -> Result<Raw<ApiUser>>;

    /// The credential's membership (roles) in `guild_id`.
    async fn current_member(&self, guild_id: Snowflake) -> Result<ApiMember>;

    async fn guild(&self, guild_id: Snowflake) -> Result<Raw<ApiGuild>>;

    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiRole>>>;

    async fn guild_emojis(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiEmoji>>>;

    async fn guild_stickers(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiSticker>>>;

    async fn guild_scheduled_events(
        &self,
        guild_id: Snowflake,
    ) -> Result<Vec<Raw<ApiScheduledEvent>>>;

    async fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiChannel>>>;

    /// Threads that are currently active anywhere in the guild.
    async fn active_threads(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiChannel>>>;

    /// One page of archived threads under `channel_id`, older than `before`
    /// (an archive timestamp taken from the previous page).
    async fn archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<&str>,
        limit: u8,
    ) -> Result<ThreadPage>;

    async fn channel(&self, channel_id: Snowflake) -> Result<Raw<ApiChannel>>;

    /// One page of at most `limit` messages. Order within the page is not relied on.
    async fn messages(
        &self,
        channel_id: Snowflake,
        cursor: MessageCursor,
        limit: u8,
    ) -> Result<Vec<Raw<ApiMessage>>>;
}

use std::fmt;

use crate::http::HttpMethod;
use crate::snowflake::Snowflake;

/// Base URL of the REST API.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Query parameters appended to a route.
pub type Query = Vec<(&'static str, String)>;

/// Every endpoint the archiver reads.
///
/// Rate-limit buckets are scoped by route template plus the route's major
/// parameter (guild or channel), which is what [`Route::bucket_key`] encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    CurrentUser,
    CurrentMember { guild_id: Snowflake },
    Guild { guild_id: Snowflake },
    GuildRoles { guild_id: Snowflake },
    GuildEmojis { guild_id: Snowflake },
    GuildStickers { guild_id: Snowflake },
    GuildScheduledEvents { guild_id: Snowflake },
    GuildChannels { guild_id: Snowflake },
    GuildActiveThreads { guild_id: Snowflake },
    Channel { channel_id: Snowflake },
    ChannelMessages { channel_id: Snowflake },
    PublicArchivedThreads { channel_id: Snowflake },
    PrivateArchivedThreads { channel_id: Snowflake },
}

impl Route {
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    /// Path template, identical for every value of the route's parameters.
    #[must_use]
    pub fn template(&self) -> &'static str {
        match self {
            Route::CurrentUser => "/users/@me",
            Route::CurrentMember { .. } => "/users/@me/guilds/{guild_id}/member",
            Route::Guild { .. } => "/guilds/{guild_id}",
            Route::GuildRoles { .. } => "/guilds/{guild_id}/roles",
            Route::GuildEmojis { .. } => "/guilds/{guild_id}/emojis",
            Route::GuildStickers { .. } => "/guilds/{guild_id}/stickers",
            Route::GuildScheduledEvents { .. } => "/guilds/{guild_id}/scheduled-events",
            Route::GuildChannels { .. } => "/guilds/{guild_id}/channels",
            Route::GuildActiveThreads { .. } => "/guilds/{guild_id}/threads/active",
            Route::Channel { .. } => "/channels/{channel_id}",
            Route::ChannelMessages { .. } => "/channels/{channel_id}/messages",
            Route::PublicArchivedThreads { .. } => "/channels/{channel_id}/threads/archived/public",
            Route::PrivateArchivedThreads { .. } => {
                "/channels/{channel_id}/threads/archived/private"
            }
        }
    }

    /// The guild or channel the route is scoped to.
    #[must_use]
    pub fn major(&self) -> Option<Snowflake> {
        match *self {
            Route::CurrentUser => None,
            Route::CurrentMember { guild_id }
            | Route::Guild { guild_id }
            | Route::GuildRoles { guild_id }
            | Route::GuildEmojis { guild_id }
            | Route::GuildStickers { guild_id }
            | Route::GuildScheduledEvents { guild_id }
            | Route::GuildChannels { guild_id }
            | Route::GuildActiveThreads { guild_id } => Some(guild_id),
            Route::Channel { channel_id }
            | Route::ChannelMessages { channel_id }
            | Route::PublicArchivedThreads { channel_id }
            | Route::PrivateArchivedThreads { channel_id } => Some(channel_id),
        }
    }

    /// Concrete request path.
    #[must_use]
    pub fn path(&self) -> String {
        match self.major() {
            Some(id) => self
                .template()
                .replace("{guild_id}", &id.to_string())
                .replace("{channel_id}", &id.to_string()),
            None => self.template().to_string(),
        }
    }

    /// Method plus template; routes sharing this share a server-side bucket hash.
    #[must_use]
    pub fn template_key(&self) -> String {
        format!("{} {}", self.method().as_str(), self.template())
    }

    /// Local bucket identity used before the server has told us its bucket hash.
    #[must_use]
    pub fn bucket_key(&self) -> String {
        match self.major() {
            Some(id) => format!("{}:{id}", self.template_key()),
            None => self.template_key(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method().as_str(), self.path())
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::api::{
    ApiError, ClientConfig, DiscordApi, MAX_PAGE_SIZE, MessageCursor, Query, RateLimitedClient,
    Result, Route, ThreadVisibility,
};
use crate::http::HttpTransport;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::snowflake::Snowflake;

use super::types::{
    ActiveThreads, ApiChannel, ApiEmoji, ApiGuild, ApiMember, ApiMessage, ApiRole,
    ApiScheduledEvent, ApiSticker, ApiUser, Raw, ThreadPage,
};

/// Typed client for the REST endpoints the archiver reads.
pub struct DiscordClient {
    client: RateLimitedClient,
}

impl DiscordClient {
    /// Create a client backed by a real HTTP transport.
    pub fn new(config: ClientConfig, timeout: Duration) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(timeout).map_err(|e| ApiError::Setup {
            message: e.to_string(),
        })?;
        Self::with_transport(Arc::new(transport), config)
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(transport, config)?,
        })
    }

    async fn get<T: DeserializeOwned>(&self, route: Route, query: Query) -> Result<T> {
        let value = self.client.fetch(&route, &query).await?;
        serde_json::from_value(value).map_err(|e| ApiError::decode(route.to_string(), e.to_string()))
    }
}

fn page_limit(limit: u8) -> String {
    limit.clamp(1, MAX_PAGE_SIZE).to_string()
}

#[async_trait]
impl DiscordApi for DiscordClient {
    async fn current_user(&self) -> Result<Raw<ApiUser>> {
        self.get(Route::CurrentUser, Vec::new()).await
    }

    async fn current_member(&self, guild_id: Snowflake) -> Result<ApiMember> {
        self.get(Route::CurrentMember { guild_id }, Vec::new()).await
    }

    async fn guild(&self, guild_id: Snowflake) -> Result<Raw<ApiGuild>> {
        self.get(
            Route::Guild { guild_id },
            vec![("with_counts", "true".to_string())],
        )
        .await
    }

    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiRole>>> {
        self.get(Route::GuildRoles { guild_id }, Vec::new()).await
    }

    async fn guild_emojis(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiEmoji>>> {
        self.get(Route::GuildEmojis { guild_id }, Vec::new()).await
    }

    async fn guild_stickers(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiSticker>>> {
        self.get(Route::GuildStickers { guild_id }, Vec::new()).await
    }

    async fn guild_scheduled_events(
        &self,
        guild_id: Snowflake,
    ) -> Result<Vec<Raw<ApiScheduledEvent>>> {
        self.get(
            Route::GuildScheduledEvents { guild_id },
            vec![("with_user_count", "true".to_string())],
        )
        .await
    }

    async fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiChannel>>> {
        self.get(Route::GuildChannels { guild_id }, Vec::new()).await
    }

    async fn active_threads(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiChannel>>> {
        let listing: ActiveThreads = self
            .get(Route::GuildActiveThreads { guild_id }, Vec::new())
            .await?;
        Ok(listing.threads)
    }

    async fn archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<&str>,
        limit: u8,
    ) -> Result<ThreadPage> {
        let route = match visibility {
            ThreadVisibility::Public => Route::PublicArchivedThreads { channel_id },
            ThreadVisibility::Private => Route::PrivateArchivedThreads { channel_id },
        };
        let mut query: Query = vec![("limit", page_limit(limit))];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        self.get(route, query).await
    }

    async fn channel(&self, channel_id: Snowflake) -> Result<Raw<ApiChannel>> {
        self.get(Route::Channel { channel_id }, Vec::new()).await
    }

    async fn messages(
        &self,
        channel_id: Snowflake,
        cursor: MessageCursor,
        limit: u8,
    ) -> Result<Vec<Raw<ApiMessage>>> {
        let mut query: Query = vec![("limit", page_limit(limit))];
        match cursor {
            MessageCursor::Latest => {}
            MessageCursor::Before(id) => query.push(("before", id.to_string())),
            MessageCursor::After(id) => query.push(("after", id.to_string())),
        }
        self.get(Route::ChannelMessages { channel_id }, query).await
    }
}

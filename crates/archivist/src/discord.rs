//! Discord REST payloads and the typed client that fetches them.
//!
//! - [`DiscordClient`] implements [`crate::api::DiscordApi`] over a
//!   [`crate::api::RateLimitedClient`].
//! - Payload types keep their raw JSON via [`Raw`] so nothing the server sends is lost.
//! - [`convert`] maps payloads onto database rows.

mod client;
pub mod convert;
mod types;

pub use client::DiscordClient;
pub use types::{
    ActiveThreads, ApiAttachment, ApiChannel, ApiEmoji, ApiGuild, ApiMember, ApiMessage,
    ApiReaction, ApiRole, ApiScheduledEvent, ApiSticker, ApiUser, ChannelType, MessageReference,
    OverwriteKind, PermissionOverwrite, Raw, ReactionEmoji, ThreadMetadata, ThreadPage,
};

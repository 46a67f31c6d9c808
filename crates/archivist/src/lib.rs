//! Archivist - a checkpointed, rate-limit aware archiver for Discord guilds.
//!
//! This library walks a guild's channels through the REST API and stores
//! guild metadata, channels, users and messages in a relational database. Each
//! channel carries a durable checkpoint, so runs can be interrupted at any
//! point and resumed without losing or duplicating messages.
//!
//! # Features
//!
//! - `sqlite` / `postgres` - Database backends.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use archivist::{connect_and_migrate, DiscordClient, ClientConfig, SeaOrmStore};
//! use archivist::sync::{Account, SyncOptions, SyncScope, run_sync};
//!
//! let db = connect_and_migrate("sqlite://archive.db?mode=rwc").await?;
//! let store = SeaOrmStore::new(db);
//! let client = DiscordClient::new(ClientConfig::new(token, "archivist"), timeout)?;
//! let accounts = vec![Account { name: "main".into(), api: Arc::new(client), guilds }];
//!
//! let summary = run_sync(&accounts, SyncScope::All, &store, &SyncOptions::default(), None).await?;
//! ```

pub mod api;
pub mod db;
pub mod discord;
pub mod entity;
pub mod http;
pub mod permissions;
pub mod repository;
pub mod retry;
pub mod snowflake;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use api::{ApiError, ClientConfig, DiscordApi, RateLimitedClient};
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use discord::DiscordClient;
pub use entity::prelude::*;
pub use repository::{RepositoryError, SeaOrmStore};
pub use snowflake::Snowflake;

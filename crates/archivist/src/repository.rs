//! Archive persistence over SeaORM.
//!
//! Free functions take any `ConnectionTrait` (or `TransactionTrait` for the
//! message batch) so they compose inside transactions and run against
//! `MockDatabase` in tests. [`SeaOrmStore`] wraps them with write retries and
//! implements the sync layer's store traits.

mod checkpoint;
mod errors;
mod message;
mod snapshot;
mod store;

pub use checkpoint::{
    channel_names, count_messages, get_checkpoint, list_checkpoints, save_checkpoint,
};
pub use errors::{RepositoryError, Result};
pub use message::persist_messages_batch;
pub use snapshot::{
    upsert_channels, upsert_emojis, upsert_guild, upsert_roles, upsert_scheduled_events,
    upsert_stickers, upsert_users,
};
pub use store::SeaOrmStore;

//! SeaORM entity definitions for the archive schema.

pub mod attachment;
pub mod channel;
pub mod emoji;
pub mod guild;
pub mod ingest_checkpoint;
pub mod message;
pub mod prelude;
pub mod reaction;
pub mod role;
pub mod scheduled_event;
pub mod sticker;
pub mod user;

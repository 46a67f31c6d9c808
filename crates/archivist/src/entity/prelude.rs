//! Common re-exports for convenient entity usage.

pub use super::attachment::{
    ActiveModel as AttachmentActiveModel, Column as AttachmentColumn, Entity as Attachment,
    Model as AttachmentModel,
};
pub use super::channel::{
    ActiveModel as ChannelActiveModel, Column as ChannelColumn, Entity as Channel,
    Model as ChannelModel,
};
pub use super::emoji::{
    ActiveModel as EmojiActiveModel, Column as EmojiColumn, Entity as Emoji, Model as EmojiModel,
};
pub use super::guild::{
    ActiveModel as GuildActiveModel, Column as GuildColumn, Entity as Guild, Model as GuildModel,
};
pub use super::ingest_checkpoint::{
    ActiveModel as IngestCheckpointActiveModel, Column as IngestCheckpointColumn,
    Entity as IngestCheckpoint, Model as IngestCheckpointModel,
};
pub use super::message::{
    ActiveModel as MessageActiveModel, Column as MessageColumn, Entity as Message,
    Model as MessageModel,
};
pub use super::reaction::{
    ActiveModel as ReactionActiveModel, Column as ReactionColumn, Entity as Reaction,
    Model as ReactionModel,
};
pub use super::role::{
    ActiveModel as RoleActiveModel, Column as RoleColumn, Entity as Role, Model as RoleModel,
};
pub use super::scheduled_event::{
    ActiveModel as ScheduledEventActiveModel, Column as ScheduledEventColumn,
    Entity as ScheduledEvent, Model as ScheduledEventModel,
};
pub use super::sticker::{
    ActiveModel as StickerActiveModel, Column as StickerColumn, Entity as Sticker,
    Model as StickerModel,
};
pub use super::user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as User, Model as UserModel,
};

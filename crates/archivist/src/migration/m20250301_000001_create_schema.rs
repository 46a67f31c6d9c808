//! Initial migration to create the archive schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_guild_tables(manager).await?;
        self.create_channels(manager).await?;
        self.create_users(manager).await?;
        self.create_message_tables(manager).await?;
        self.create_ingest_checkpoints(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            IngestCheckpoints::Table.into_iden(),
            Reactions::Table.into_iden(),
            Attachments::Table.into_iden(),
            Messages::Table.into_iden(),
            Users::Table.into_iden(),
            Channels::Table.into_iden(),
            GuildScheduledEvents::Table.into_iden(),
            Stickers::Table.into_iden(),
            Emojis::Table.into_iden(),
            Roles::Table.into_iden(),
            Guilds::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

/// `archived_at` / `updated_at` pair shared by every snapshot table.
fn archived_at<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn raw<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .json()
        .not_null()
        .default(Expr::cust("'{}'"))
        .to_owned()
}

impl Migration {
    async fn index<T, C>(
        &self,
        manager: &SchemaManager<'_>,
        name: &str,
        table: T,
        cols: impl IntoIterator<Item = C>,
    ) -> Result<(), DbErr>
    where
        T: IntoIden + 'static,
        C: IntoIndexColumn,
    {
        let mut index = Index::create();
        index.name(name).table(table).if_not_exists();
        for col in cols {
            index.col(col);
        }
        manager.create_index(index.to_owned()).await
    }

    async fn create_guild_tables(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Guilds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Guilds::GuildId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Guilds::Name).text().not_null())
                    .col(ColumnDef::new(Guilds::Icon).string().null())
                    .col(ColumnDef::new(Guilds::Description).text().null())
                    .col(ColumnDef::new(Guilds::OwnerId).big_integer().null())
                    .col(
                        ColumnDef::new(Guilds::Features)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Guilds::PremiumTier)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Guilds::PreferredLocale).string().null())
                    .col(
                        ColumnDef::new(Guilds::ApproximateMemberCount)
                            .integer()
                            .null(),
                    )
                    .col(raw(Guilds::Raw))
                    .col(archived_at(Guilds::ArchivedAt))
                    .col(archived_at(Guilds::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Roles::RoleId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Roles::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(Roles::Name).text().not_null())
                    .col(ColumnDef::new(Roles::Color).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Roles::Hoist).boolean().not_null().default(false))
                    .col(ColumnDef::new(Roles::Position).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Roles::Permissions)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(Roles::Managed).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Roles::Mentionable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(raw(Roles::Raw))
                    .col(archived_at(Roles::ArchivedAt))
                    .col(archived_at(Roles::UpdatedAt))
                    .to_owned(),
            )
            .await?;
        self.index(manager, "idx_roles_guild_id", Roles::Table, [Roles::GuildId])
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Emojis::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Emojis::EmojiId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Emojis::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(Emojis::Name).string().null())
                    .col(ColumnDef::new(Emojis::Animated).boolean().not_null().default(false))
                    .col(ColumnDef::new(Emojis::Available).boolean().not_null().default(true))
                    .col(ColumnDef::new(Emojis::Managed).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Emojis::RequireColons)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Emojis::Roles)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(ColumnDef::new(Emojis::CreatorId).big_integer().null())
                    .col(raw(Emojis::Raw))
                    .col(archived_at(Emojis::ArchivedAt))
                    .col(archived_at(Emojis::UpdatedAt))
                    .to_owned(),
            )
            .await?;
        self.index(manager, "idx_emojis_guild_id", Emojis::Table, [Emojis::GuildId])
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Stickers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stickers::StickerId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Stickers::GuildId).big_integer().null())
                    .col(ColumnDef::new(Stickers::PackId).big_integer().null())
                    .col(ColumnDef::new(Stickers::Name).string().not_null())
                    .col(ColumnDef::new(Stickers::Description).text().null())
                    .col(ColumnDef::new(Stickers::Tags).string().null())
                    .col(ColumnDef::new(Stickers::StickerType).integer().not_null())
                    .col(ColumnDef::new(Stickers::FormatType).integer().not_null())
                    .col(ColumnDef::new(Stickers::Available).boolean().null())
                    .col(ColumnDef::new(Stickers::CreatorId).big_integer().null())
                    .col(raw(Stickers::Raw))
                    .col(archived_at(Stickers::ArchivedAt))
                    .col(archived_at(Stickers::UpdatedAt))
                    .to_owned(),
            )
            .await?;
        self.index(
            manager,
            "idx_stickers_guild_id",
            Stickers::Table,
            [Stickers::GuildId],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(GuildScheduledEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GuildScheduledEvents::EventId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GuildScheduledEvents::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GuildScheduledEvents::ChannelId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(GuildScheduledEvents::CreatorId)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(GuildScheduledEvents::Name).text().not_null())
                    .col(ColumnDef::new(GuildScheduledEvents::Description).text().null())
                    .col(
                        ColumnDef::new(GuildScheduledEvents::ScheduledStartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GuildScheduledEvents::ScheduledEndTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(GuildScheduledEvents::PrivacyLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GuildScheduledEvents::Status).integer().not_null())
                    .col(
                        ColumnDef::new(GuildScheduledEvents::EntityType)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GuildScheduledEvents::UserCount).integer().null())
                    .col(raw(GuildScheduledEvents::Raw))
                    .col(archived_at(GuildScheduledEvents::ArchivedAt))
                    .col(archived_at(GuildScheduledEvents::UpdatedAt))
                    .to_owned(),
            )
            .await?;
        self.index(
            manager,
            "idx_scheduled_events_guild_id",
            GuildScheduledEvents::Table,
            [GuildScheduledEvents::GuildId],
        )
        .await?;

        Ok(())
    }

    async fn create_channels(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Channels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Channels::ChannelId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Channels::GuildId).big_integer().null())
                    // Soft reference: threads can be archived before their parent is seen.
                    .col(ColumnDef::new(Channels::ParentId).big_integer().null())
                    .col(ColumnDef::new(Channels::ChannelType).integer().not_null())
                    .col(ColumnDef::new(Channels::Name).text().null())
                    .col(ColumnDef::new(Channels::Topic).text().null())
                    .col(ColumnDef::new(Channels::Position).integer().null())
                    .col(ColumnDef::new(Channels::Nsfw).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Channels::PermissionOverwrites)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(ColumnDef::new(Channels::ThreadMetadata).json().null())
                    .col(ColumnDef::new(Channels::OwnerId).big_integer().null())
                    .col(ColumnDef::new(Channels::LastMessageId).big_integer().null())
                    .col(raw(Channels::Raw))
                    .col(archived_at(Channels::ArchivedAt))
                    .col(archived_at(Channels::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        self.index(
            manager,
            "idx_channels_guild_id",
            Channels::Table,
            [Channels::GuildId],
        )
        .await?;
        self.index(
            manager,
            "idx_channels_parent_id",
            Channels::Table,
            [Channels::ParentId],
        )
        .await
    }

    async fn create_users(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string().null())
                    .col(ColumnDef::new(Users::Discriminator).string().null())
                    .col(ColumnDef::new(Users::GlobalName).string().null())
                    .col(ColumnDef::new(Users::Avatar).string().null())
                    .col(ColumnDef::new(Users::Bot).boolean().not_null().default(false))
                    .col(ColumnDef::new(Users::System).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Users::PublicFlags)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(raw(Users::Raw))
                    .col(archived_at(Users::ArchivedAt))
                    .col(archived_at(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;
        self.index(manager, "idx_users_username", Users::Table, [Users::Username])
            .await
    }

    async fn create_message_tables(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Messages::MessageId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Messages::ChannelId).big_integer().not_null())
                    .col(ColumnDef::new(Messages::GuildId).big_integer().null())
                    .col(ColumnDef::new(Messages::AuthorId).big_integer().not_null())
                    .col(ColumnDef::new(Messages::Content).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Messages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Messages::EditedTimestamp)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Messages::MessageType)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Messages::Tts).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Messages::Flags)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Messages::Pinned).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Messages::MentionEveryone)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Messages::Mentions)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Messages::MentionRoles)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(ColumnDef::new(Messages::WebhookId).big_integer().null())
                    .col(
                        ColumnDef::new(Messages::ReferencedMessageId)
                            .big_integer()
                            .null(),
                    )
                    .col(raw(Messages::Raw))
                    .col(archived_at(Messages::ArchivedAt))
                    .to_owned(),
            )
            .await?;

        self.index(
            manager,
            "idx_messages_channel_id",
            Messages::Table,
            [Messages::ChannelId],
        )
        .await?;
        self.index(
            manager,
            "idx_messages_author_id",
            Messages::Table,
            [Messages::AuthorId],
        )
        .await?;
        self.index(
            manager,
            "idx_messages_guild_created",
            Messages::Table,
            [Messages::GuildId, Messages::CreatedAt],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(Attachments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attachments::AttachmentId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Attachments::MessageId).big_integer().not_null())
                    .col(ColumnDef::new(Attachments::Filename).text().not_null())
                    .col(ColumnDef::new(Attachments::Description).text().null())
                    .col(ColumnDef::new(Attachments::ContentType).string().null())
                    .col(
                        ColumnDef::new(Attachments::Size)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Attachments::Url).text().not_null())
                    .col(ColumnDef::new(Attachments::ProxyUrl).text().null())
                    .col(ColumnDef::new(Attachments::Height).integer().null())
                    .col(ColumnDef::new(Attachments::Width).integer().null())
                    .col(raw(Attachments::Raw))
                    .col(archived_at(Attachments::ArchivedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachments_message")
                            .from(Attachments::Table, Attachments::MessageId)
                            .to(Messages::Table, Messages::MessageId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        self.index(
            manager,
            "idx_attachments_message_id",
            Attachments::Table,
            [Attachments::MessageId],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reactions::MessageId).big_integer().not_null())
                    .col(ColumnDef::new(Reactions::EmojiKey).string().not_null())
                    .col(ColumnDef::new(Reactions::EmojiId).big_integer().null())
                    .col(ColumnDef::new(Reactions::EmojiName).string().null())
                    .col(
                        ColumnDef::new(Reactions::EmojiAnimated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Reactions::Count).integer().not_null().default(0))
                    .col(raw(Reactions::Raw))
                    .col(archived_at(Reactions::ArchivedAt))
                    .col(archived_at(Reactions::UpdatedAt))
                    .primary_key(
                        Index::create()
                            .col(Reactions::MessageId)
                            .col(Reactions::EmojiKey),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reactions_message")
                            .from(Reactions::Table, Reactions::MessageId)
                            .to(Messages::Table, Messages::MessageId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_ingest_checkpoints(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IngestCheckpoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IngestCheckpoints::ChannelId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IngestCheckpoints::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IngestCheckpoints::OldestMessageId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IngestCheckpoints::NewestMessageId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(IngestCheckpoints::BackfillComplete)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(IngestCheckpoints::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IngestCheckpoints::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        self.index(
            manager,
            "idx_ingest_checkpoints_guild_id",
            IngestCheckpoints::Table,
            [IngestCheckpoints::GuildId],
        )
        .await?;
        self.index(
            manager,
            "idx_ingest_checkpoints_backfill_complete",
            IngestCheckpoints::Table,
            [IngestCheckpoints::BackfillComplete],
        )
        .await
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "guilds")]
enum Guilds {
    Table,
    GuildId,
    Name,
    Icon,
    Description,
    OwnerId,
    Features,
    PremiumTier,
    PreferredLocale,
    ApproximateMemberCount,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "roles")]
enum Roles {
    Table,
    RoleId,
    GuildId,
    Name,
    Color,
    Hoist,
    Position,
    Permissions,
    Managed,
    Mentionable,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "emojis")]
enum Emojis {
    Table,
    EmojiId,
    GuildId,
    Name,
    Animated,
    Available,
    Managed,
    RequireColons,
    Roles,
    CreatorId,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "stickers")]
enum Stickers {
    Table,
    StickerId,
    GuildId,
    PackId,
    Name,
    Description,
    Tags,
    StickerType,
    FormatType,
    Available,
    CreatorId,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "guild_scheduled_events")]
enum GuildScheduledEvents {
    Table,
    EventId,
    GuildId,
    ChannelId,
    CreatorId,
    Name,
    Description,
    ScheduledStartTime,
    ScheduledEndTime,
    PrivacyLevel,
    Status,
    EntityType,
    UserCount,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "channels")]
enum Channels {
    Table,
    ChannelId,
    GuildId,
    ParentId,
    ChannelType,
    Name,
    Topic,
    Position,
    Nsfw,
    PermissionOverwrites,
    ThreadMetadata,
    OwnerId,
    LastMessageId,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "users")]
enum Users {
    Table,
    UserId,
    Username,
    Discriminator,
    GlobalName,
    Avatar,
    Bot,
    System,
    PublicFlags,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "messages")]
enum Messages {
    Table,
    MessageId,
    ChannelId,
    GuildId,
    AuthorId,
    Content,
    CreatedAt,
    EditedTimestamp,
    MessageType,
    Tts,
    Flags,
    Pinned,
    MentionEveryone,
    Mentions,
    MentionRoles,
    WebhookId,
    ReferencedMessageId,
    Raw,
    ArchivedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "attachments")]
enum Attachments {
    Table,
    AttachmentId,
    MessageId,
    Filename,
    Description,
    ContentType,
    Size,
    Url,
    ProxyUrl,
    Height,
    Width,
    Raw,
    ArchivedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "reactions")]
enum Reactions {
    Table,
    MessageId,
    EmojiKey,
    EmojiId,
    EmojiName,
    EmojiAnimated,
    Count,
    Raw,
    ArchivedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "ingest_checkpoints")]
enum IngestCheckpoints {
    Table,
    ChannelId,
    GuildId,
    OldestMessageId,
    NewestMessageId,
    BackfillComplete,
    LastSyncedAt,
    CreatedAt,
}

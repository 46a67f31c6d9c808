//! Transactional persistence of message pages.

use std::collections::BTreeMap;

use sea_orm::sea_query::{Alias, Expr, OnConflict};
use sea_orm::{Condition, ConnectionTrait, EntityTrait, TransactionTrait};

use crate::discord::convert::collect_users;
use crate::discord::{ApiMessage, Raw};
use crate::entity::prelude::{
    Attachment, AttachmentColumn, Message, MessageColumn, Reaction, ReactionActiveModel,
    ReactionColumn,
};
use crate::snowflake::Snowflake;

use super::errors::Result;
use super::snapshot::upsert_users;

/// Messages are append-only. A re-delivered message only overwrites content, edit
/// timestamp and raw payload when it carries a strictly newer edit timestamp.
pub(crate) fn message_on_conflict() -> OnConflict {
    let incoming = || Expr::col((Alias::new("excluded"), MessageColumn::EditedTimestamp));
    let stored = || Expr::col((Message, MessageColumn::EditedTimestamp));

    OnConflict::column(MessageColumn::MessageId)
        .update_columns([
            MessageColumn::Content,
            MessageColumn::EditedTimestamp,
            MessageColumn::Raw,
        ])
        .action_and_where(
            Condition::all()
                .add(incoming().is_not_null())
                .add(
                    Condition::any()
                        .add(stored().is_null())
                        .add(incoming().gt(stored())),
                )
                .into(),
        )
        .to_owned()
}

/// Attachments never change once posted.
pub(crate) fn attachment_on_conflict() -> OnConflict {
    OnConflict::column(AttachmentColumn::AttachmentId)
        .do_nothing()
        .to_owned()
}

/// Reaction counts track the latest observation.
pub(crate) fn reaction_on_conflict() -> OnConflict {
    OnConflict::columns([ReactionColumn::MessageId, ReactionColumn::EmojiKey])
        .update_columns([
            ReactionColumn::EmojiName,
            ReactionColumn::EmojiAnimated,
            ReactionColumn::Count,
            ReactionColumn::Raw,
            ReactionColumn::UpdatedAt,
        ])
        .to_owned()
}

/// Persist a page of messages in one transaction: referenced users, the messages,
/// their attachments and their reactions.
///
/// Returns the number of messages in the page. Either the whole page is stored or
/// nothing is.
pub async fn persist_messages_batch<C: TransactionTrait>(
    db: &C,
    guild_id: Option<Snowflake>,
    messages: &[Raw<ApiMessage>],
) -> Result<u64> {
    if messages.is_empty() {
        return Ok(0);
    }

    let txn = db.begin().await?;
    write_batch(&txn, guild_id, messages).await?;
    txn.commit().await?;

    tracing::debug!(count = messages.len(), "Persisted message batch");
    Ok(messages.len() as u64)
}

async fn write_batch<C: ConnectionTrait>(
    db: &C,
    guild_id: Option<Snowflake>,
    messages: &[Raw<ApiMessage>],
) -> Result<()> {
    upsert_users(db, &collect_users(messages)).await?;

    // A page never repeats a message, but a statement must not touch a row twice.
    let unique: BTreeMap<Snowflake, &Raw<ApiMessage>> =
        messages.iter().map(|m| (m.id, m)).collect();

    Message::insert_many(unique.values().map(|m| m.to_active_model(guild_id)))
        .on_conflict(message_on_conflict())
        .exec_without_returning(db)
        .await?;

    let attachments: BTreeMap<Snowflake, _> = unique
        .values()
        .flat_map(|m| {
            m.attachments
                .iter()
                .map(move |a| (a.id, a.to_active_model(m.id)))
        })
        .collect();
    if !attachments.is_empty() {
        Attachment::insert_many(attachments.into_values())
            .on_conflict(attachment_on_conflict())
            .exec_without_returning(db)
            .await?;
    }

    let reactions: BTreeMap<(Snowflake, String), ReactionActiveModel> = unique
        .values()
        .flat_map(|m| {
            m.reactions
                .iter()
                .map(move |r| ((m.id, r.emoji.key()), r.to_active_model(m.id)))
        })
        .collect();
    if !reactions.is_empty() {
        Reaction::insert_many(reactions.into_values())
            .on_conflict(reaction_on_conflict())
            .exec_without_returning(db)
            .await?;
    }

    Ok(())
}

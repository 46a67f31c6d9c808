//! In-memory API and store fakes for engine and coordinator tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sea_orm::DbErr;
use serde_json::{Value, json};

use crate::api::{ApiError, DiscordApi, MessageCursor, Result as ApiResult, ThreadVisibility};
use crate::discord::{
    ApiChannel, ApiEmoji, ApiGuild, ApiMember, ApiMessage, ApiRole, ApiScheduledEvent, ApiSticker,
    ApiUser, Raw, ThreadPage,
};
use crate::repository::{RepositoryError, Result as StoreResult};
use crate::snowflake::Snowflake;

use super::checkpoint::Checkpoint;
use super::store::{ArchiveStore, CheckpointStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn raw<T: serde::de::DeserializeOwned>(value: Value) -> Raw<T> {
    Raw::from_value(value).expect("fake payload decodes")
}

pub(crate) fn message_json(channel_id: u64, id: u64) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "author": {"id": "5", "username": "ferris"},
        "content": format!("message {id}"),
        "timestamp": Snowflake(id).timestamp().to_rfc3339(),
        "type": 0
    })
}

pub(crate) fn channel_json(guild_id: u64, id: u64, kind: i32, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "guild_id": guild_id.to_string(),
        "type": kind,
        "name": name,
        "permission_overwrites": []
    })
}

#[derive(Default)]
struct FakeState {
    user_id: u64,
    unauthorized: bool,
    guilds: HashMap<Snowflake, Value>,
    roles: HashMap<Snowflake, Vec<Value>>,
    member_roles: HashMap<Snowflake, Vec<Snowflake>>,
    member_unavailable: bool,
    emojis_forbidden: bool,
    channels: HashMap<Snowflake, Vec<Value>>,
    archived: HashMap<(Snowflake, ThreadVisibility), Vec<Value>>,
    active_threads: HashMap<Snowflake, Vec<Value>>,
    messages: HashMap<Snowflake, BTreeSet<u64>>,
    forbidden_channels: HashSet<Snowflake>,
    transient_after: HashMap<Snowflake, u32>,
    yields_per_page: u32,
    message_calls: HashMap<Snowflake, u32>,
    thread_calls: Vec<(Snowflake, ThreadVisibility, Option<String>)>,
}

/// Scriptable stand-in for the remote API.
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new(user_id: u64) -> Self {
        Self {
            state: Mutex::new(FakeState {
                user_id,
                ..FakeState::default()
            }),
        }
    }

    /// Add a guild whose @everyone role can view and read every channel.
    pub fn with_guild(self, guild_id: u64, name: &str) -> Self {
        {
            let mut state = lock(&self.state);
            let id = Snowflake(guild_id);
            state.guilds.insert(
                id,
                json!({"id": guild_id.to_string(), "name": name, "owner_id": "1"}),
            );
            state.roles.insert(
                id,
                vec![json!({
                    "id": guild_id.to_string(),
                    "name": "@everyone",
                    "permissions": ((1u64 << 10) | (1u64 << 16) | (1u64 << 20)).to_string()
                })],
            );
        }
        self
    }

    pub fn with_channel(self, guild_id: u64, channel: Value) -> Self {
        lock(&self.state)
            .channels
            .entry(Snowflake(guild_id))
            .or_default()
            .push(channel);
        self
    }

    pub fn with_archived_thread(
        self,
        parent_id: u64,
        visibility: ThreadVisibility,
        thread: Value,
    ) -> Self {
        lock(&self.state)
            .archived
            .entry((Snowflake(parent_id), visibility))
            .or_default()
            .push(thread);
        self
    }

    pub fn with_active_thread(self, guild_id: u64, thread: Value) -> Self {
        lock(&self.state)
            .active_threads
            .entry(Snowflake(guild_id))
            .or_default()
            .push(thread);
        self
    }

    pub fn with_messages(self, channel_id: u64, ids: impl IntoIterator<Item = u64>) -> Self {
        self.add_messages(channel_id, ids);
        self
    }

    pub fn add_messages(&self, channel_id: u64, ids: impl IntoIterator<Item = u64>) {
        lock(&self.state)
            .messages
            .entry(Snowflake(channel_id))
            .or_default()
            .extend(ids);
    }

    pub fn forbid_channel(&self, channel_id: u64) {
        lock(&self.state)
            .forbidden_channels
            .insert(Snowflake(channel_id));
    }

    /// Let `calls` more message fetches on the channel succeed, then fail them all
    /// with a transient failure.
    pub fn fail_after(&self, channel_id: u64, calls: u32) {
        let mut state = lock(&self.state);
        let done = state
            .message_calls
            .get(&Snowflake(channel_id))
            .copied()
            .unwrap_or_default();
        state
            .transient_after
            .insert(Snowflake(channel_id), done + calls);
    }

    pub fn clear_failures(&self) {
        let mut state = lock(&self.state);
        state.transient_after.clear();
        state.forbidden_channels.clear();
    }

    fn message_page(
        &self,
        channel_id: Snowflake,
        cursor: MessageCursor,
        limit: u8,
    ) -> ApiResult<(Vec<u64>, u32)> {
        let mut state = lock(&self.state);
        let path = format!("/channels/{channel_id}/messages");

        if state.forbidden_channels.contains(&channel_id) {
            return Err(ApiError::Forbidden { route: route(path) });
        }
        let calls = state.message_calls.get(&channel_id).copied().unwrap_or(0);
        if state
            .transient_after
            .get(&channel_id)
            .is_some_and(|limit| calls >= *limit)
        {
            return Err(ApiError::TransientFailure {
                route: route(path),
                attempts: 5,
                message: "502 Bad Gateway".into(),
            });
        }
        state.message_calls.insert(channel_id, calls + 1);

        let limit = usize::from(limit);
        let ids = state.messages.get(&channel_id).cloned().unwrap_or_default();
        let page: Vec<u64> = match cursor {
            MessageCursor::Latest => ids.iter().rev().take(limit).copied().collect(),
            MessageCursor::Before(before) => {
                ids.range(..before.get()).rev().take(limit).copied().collect()
            }
            MessageCursor::After(after) => {
                let mut page: Vec<u64> = ids
                    .range(after.get().saturating_add(1)..)
                    .take(limit)
                    .copied()
                    .collect();
                page.reverse();
                page
            }
        };
        Ok((page, state.yields_per_page))
    }

    /// Hand control back to the runtime `yields` times on every message page, so
    /// concurrent passes interleave.
    pub fn with_page_yields(self, yields: u32) -> Self {
        lock(&self.state).yields_per_page = yields;
        self
    }

    pub fn set_unauthorized(&self) {
        lock(&self.state).unauthorized = true;
    }

    pub fn forbid_emojis(&self) {
        lock(&self.state).emojis_forbidden = true;
    }

    pub fn hide_member(&self) {
        lock(&self.state).member_unavailable = true;
    }

    /// Successful message fetches made against a channel.
    pub fn message_calls(&self, channel_id: u64) -> u32 {
        lock(&self.state)
            .message_calls
            .get(&Snowflake(channel_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn thread_calls(&self) -> Vec<(Snowflake, ThreadVisibility, Option<String>)> {
        lock(&self.state).thread_calls.clone()
    }
}

fn route(path: String) -> String {
    format!("GET {path}")
}

#[async_trait]
impl DiscordApi for FakeApi {
    async fn current_user(&self) -> ApiResult<Raw<ApiUser>> {
        let state = lock(&self.state);
        if state.unauthorized {
            return Err(ApiError::ClientError {
                status: 401,
                route: route("/users/@me".into()),
                message: "401: Unauthorized".into(),
            });
        }
        Ok(raw(json!({"id": state.user_id.to_string(), "username": "archiver"})))
    }

    async fn current_member(&self, guild_id: Snowflake) -> ApiResult<ApiMember> {
        let state = lock(&self.state);
        if state.member_unavailable {
            return Err(ApiError::ClientError {
                status: 404,
                route: route(format!("/users/@me/guilds/{guild_id}/member")),
                message: "Unknown Member".into(),
            });
        }
        Ok(ApiMember {
            roles: state
                .member_roles
                .get(&guild_id)
                .cloned()
                .unwrap_or_default(),
            user: None,
            nick: None,
        })
    }

    async fn guild(&self, guild_id: Snowflake) -> ApiResult<Raw<ApiGuild>> {
        lock(&self.state)
            .guilds
            .get(&guild_id)
            .cloned()
            .map(raw)
            .ok_or_else(|| ApiError::ClientError {
                status: 404,
                route: route(format!("/guilds/{guild_id}")),
                message: "Unknown Guild".into(),
            })
    }

    async fn guild_roles(&self, guild_id: Snowflake) -> ApiResult<Vec<Raw<ApiRole>>> {
        Ok(lock(&self.state)
            .roles
            .get(&guild_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(raw)
            .collect())
    }

    async fn guild_emojis(&self, guild_id: Snowflake) -> ApiResult<Vec<Raw<ApiEmoji>>> {
        if lock(&self.state).emojis_forbidden {
            return Err(ApiError::Forbidden {
                route: route(format!("/guilds/{guild_id}/emojis")),
            });
        }
        Ok(vec![raw(json!({"id": "4242", "name": "ferris"}))])
    }

    async fn guild_stickers(&self, _guild_id: Snowflake) -> ApiResult<Vec<Raw<ApiSticker>>> {
        Ok(Vec::new())
    }

    async fn guild_scheduled_events(
        &self,
        _guild_id: Snowflake,
    ) -> ApiResult<Vec<Raw<ApiScheduledEvent>>> {
        Ok(Vec::new())
    }

    async fn guild_channels(&self, guild_id: Snowflake) -> ApiResult<Vec<Raw<ApiChannel>>> {
        Ok(lock(&self.state)
            .channels
            .get(&guild_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(raw)
            .collect())
    }

    async fn active_threads(&self, guild_id: Snowflake) -> ApiResult<Vec<Raw<ApiChannel>>> {
        Ok(lock(&self.state)
            .active_threads
            .get(&guild_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(raw)
            .collect())
    }

    async fn archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<&str>,
        limit: u8,
    ) -> ApiResult<ThreadPage> {
        let mut state = lock(&self.state);
        state
            .thread_calls
            .push((channel_id, visibility, before.map(str::to_string)));

        let mut threads: Vec<Value> = state
            .archived
            .get(&(channel_id, visibility))
            .cloned()
            .unwrap_or_default();
        let stamp = |t: &Value| {
            t["thread_metadata"]["archive_timestamp"]
                .as_str()
                .unwrap_or_default()
                .to_string()
        };
        threads.sort_by_key(|t| std::cmp::Reverse(stamp(t)));
        let older: Vec<Value> = threads
            .into_iter()
            .filter(|t| before.is_none_or(|b| stamp(t).as_str() < b))
            .collect();
        let has_more = older.len() > usize::from(limit);
        Ok(ThreadPage {
            threads: older
                .into_iter()
                .take(usize::from(limit))
                .map(raw)
                .collect(),
            has_more,
        })
    }

    async fn channel(&self, channel_id: Snowflake) -> ApiResult<Raw<ApiChannel>> {
        let state = lock(&self.state);
        state
            .channels
            .values()
            .flatten()
            .find(|c| c["id"] == json!(channel_id.to_string()))
            .cloned()
            .map(raw)
            .ok_or_else(|| ApiError::ClientError {
                status: 404,
                route: route(format!("/channels/{channel_id}")),
                message: "Unknown Channel".into(),
            })
    }

    async fn messages(
        &self,
        channel_id: Snowflake,
        cursor: MessageCursor,
        limit: u8,
    ) -> ApiResult<Vec<Raw<ApiMessage>>> {
        let (page, yields) = self.message_page(channel_id, cursor, limit)?;
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
        Ok(page
            .into_iter()
            .map(|id| raw(message_json(channel_id.get(), id)))
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct StoreState {
    pub guilds: BTreeMap<Snowflake, String>,
    pub roles: BTreeSet<Snowflake>,
    pub emojis: BTreeSet<Snowflake>,
    pub channels: BTreeMap<Snowflake, Option<String>>,
    pub users: BTreeSet<Snowflake>,
    /// message id to channel id
    pub messages: BTreeMap<Snowflake, Snowflake>,
    /// Every message delivered, re-deliveries included.
    pub message_writes: u64,
    pub checkpoints: HashMap<Snowflake, Checkpoint>,
    /// The stored checkpoint after every save, in order.
    pub saves: Vec<Checkpoint>,
    /// Remaining checkpoint saves before saves start failing.
    pub saves_before_failure: Option<usize>,
}

/// In-memory archive store.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, StoreState> {
        lock(&self.state)
    }

    /// Let `saves` more checkpoint saves succeed, then fail (simulating a crash
    /// between persisting a batch and recording it).
    pub fn fail_checkpoint_saves_after(&self, saves: usize) {
        self.state().saves_before_failure = Some(saves);
    }

    pub fn heal(&self) {
        self.state().saves_before_failure = None;
    }

    pub fn message_ids(&self, channel_id: u64) -> Vec<u64> {
        self.state()
            .messages
            .iter()
            .filter(|(_, channel)| **channel == Snowflake(channel_id))
            .map(|(id, _)| id.get())
            .collect()
    }

    pub fn checkpoint(&self, channel_id: u64) -> Option<Checkpoint> {
        self.state()
            .checkpoints
            .get(&Snowflake(channel_id))
            .cloned()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn get_checkpoint(&self, channel_id: Snowflake) -> StoreResult<Option<Checkpoint>> {
        Ok(self.state().checkpoints.get(&channel_id).cloned())
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> StoreResult<()> {
        let mut state = self.state();
        match state.saves_before_failure {
            Some(0) => {
                return Err(RepositoryError::Database(DbErr::Custom(
                    "injected checkpoint failure".into(),
                )));
            }
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        let mut stored = checkpoint.clone();
        if let Some(previous) = state.checkpoints.get(&checkpoint.channel_id()) {
            stored.merge(previous);
        }
        state
            .checkpoints
            .insert(checkpoint.channel_id(), stored.clone());
        state.saves.push(stored);
        Ok(())
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert_guild(&self, guild: &Raw<ApiGuild>) -> StoreResult<()> {
        self.state().guilds.insert(guild.id, guild.name.clone());
        Ok(())
    }

    async fn upsert_roles(&self, _guild_id: Snowflake, roles: &[Raw<ApiRole>]) -> StoreResult<u64> {
        self.state().roles.extend(roles.iter().map(|r| r.id));
        Ok(roles.len() as u64)
    }

    async fn upsert_emojis(
        &self,
        _guild_id: Snowflake,
        emojis: &[Raw<ApiEmoji>],
    ) -> StoreResult<u64> {
        self.state().emojis.extend(emojis.iter().filter_map(|e| e.id));
        Ok(emojis.len() as u64)
    }

    async fn upsert_stickers(
        &self,
        _guild_id: Snowflake,
        stickers: &[Raw<ApiSticker>],
    ) -> StoreResult<u64> {
        Ok(stickers.len() as u64)
    }

    async fn upsert_scheduled_events(
        &self,
        events: &[Raw<ApiScheduledEvent>],
    ) -> StoreResult<u64> {
        Ok(events.len() as u64)
    }

    async fn upsert_channels(
        &self,
        _guild_id: Option<Snowflake>,
        channels: &[Raw<ApiChannel>],
    ) -> StoreResult<u64> {
        let mut state = self.state();
        for channel in channels {
            state.channels.insert(channel.id, channel.name.clone());
        }
        Ok(channels.len() as u64)
    }

    async fn upsert_users(&self, users: &[&Raw<ApiUser>]) -> StoreResult<u64> {
        self.state().users.extend(users.iter().map(|u| u.id));
        Ok(users.len() as u64)
    }

    async fn persist_messages_batch(
        &self,
        _guild_id: Option<Snowflake>,
        messages: &[Raw<ApiMessage>],
    ) -> StoreResult<u64> {
        let mut state = self.state();
        for message in messages {
            state.users.insert(message.author.id);
            state.messages.insert(message.id, message.channel_id);
        }
        state.message_writes += messages.len() as u64;
        Ok(messages.len() as u64)
    }
}

/// Shorthand for `ApiChannel` payloads built by [`channel_json`].
pub(crate) fn channel(guild_id: u64, id: u64, kind: i32, name: &str) -> Raw<ApiChannel> {
    raw(channel_json(guild_id, id, kind, name))
}

//! Channel and thread enumeration with access classification.

use std::collections::{HashMap, HashSet};

use crate::api::{ApiError, DiscordApi, MessageCursor, Result, ThreadVisibility};
use crate::discord::{ApiChannel, Raw};
use crate::permissions::{Access, PermissionContext};
use crate::snowflake::Snowflake;

/// A message-bearing channel together with its access verdict.
#[derive(Debug, Clone)]
pub struct DiscoveredChannel {
    pub channel: Raw<ApiChannel>,
    pub access: Access,
}

/// Everything enumerated for one guild.
#[derive(Debug, Default)]
pub struct ChannelDiscovery {
    /// Every channel and thread seen, for snapshotting.
    pub all: Vec<Raw<ApiChannel>>,
    /// Message-bearing channels, in sync order (parents before their threads).
    pub candidates: Vec<DiscoveredChannel>,
    pub thread_count: usize,
    /// Listings that failed but did not abort discovery.
    pub warnings: Vec<String>,
}

impl ChannelDiscovery {
    #[must_use]
    pub fn readable(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.access == Access::Accessible)
            .count()
    }
}

/// Lists a guild's channels and threads and decides which of them can be read.
///
/// With a [`PermissionContext`] access is computed locally; without one each
/// channel is probed with a single one-message fetch.
pub struct ChannelFetcher<'a, A: DiscordApi + ?Sized> {
    api: &'a A,
    permissions: Option<&'a PermissionContext>,
    thread_page_size: u8,
}

impl<'a, A: DiscordApi + ?Sized> ChannelFetcher<'a, A> {
    pub fn new(api: &'a A, thread_page_size: u8) -> Self {
        Self {
            api,
            permissions: None,
            thread_page_size,
        }
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: &'a PermissionContext) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub async fn list_channels(&self, guild_id: Snowflake) -> Result<Vec<Raw<ApiChannel>>> {
        self.api.guild_channels(guild_id).await
    }

    /// Archived threads under `parent`, public first.
    ///
    /// Private threads are only listed when the parent supports them and the
    /// credential may list them. A forbidden listing yields no threads.
    pub async fn list_archived_threads(&self, parent: &ApiChannel) -> Result<Vec<Raw<ApiChannel>>> {
        let mut threads = self
            .archived_pages(parent.id, ThreadVisibility::Public)
            .await?;

        let private_allowed = parent.kind.has_private_threads()
            && self
                .permissions
                .is_none_or(|ctx| ctx.can_list_private_threads(parent));
        if private_allowed {
            threads.extend(
                self.archived_pages(parent.id, ThreadVisibility::Private)
                    .await?,
            );
        }
        Ok(threads)
    }

    async fn archived_pages(
        &self,
        parent_id: Snowflake,
        visibility: ThreadVisibility,
    ) -> Result<Vec<Raw<ApiChannel>>> {
        let mut threads = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let page = match self
                .api
                .archived_threads(parent_id, visibility, before.as_deref(), self.thread_page_size)
                .await
            {
                Ok(page) => page,
                Err(e) if e.is_forbidden() => {
                    tracing::debug!(%parent_id, ?visibility, "Archived thread listing forbidden");
                    break;
                }
                Err(e) => return Err(e),
            };

            let next = page
                .threads
                .last()
                .and_then(|t| t.thread_metadata.as_ref())
                .and_then(|m| m.archive_timestamp.clone());
            threads.extend(page.threads);

            // Stop on the last page, or if the cursor would not advance.
            match next {
                Some(next) if page.has_more && before.as_deref() != Some(next.as_str()) => {
                    before = Some(next);
                }
                _ => break,
            }
        }
        Ok(threads)
    }

    /// Decide whether `channel` can be read.
    pub async fn check_access(&self, channel: &ApiChannel, parent: Option<&ApiChannel>) -> Access {
        if let Some(ctx) = self.permissions {
            return if ctx.can_read(channel, parent) {
                Access::Accessible
            } else {
                Access::Forbidden
            };
        }

        match self.api.messages(channel.id, MessageCursor::Latest, 1).await {
            Ok(_) => Access::Accessible,
            Err(e) if e.is_forbidden() => Access::Forbidden,
            Err(e) => {
                tracing::warn!(channel = %channel.label(), error = %e, "Access probe failed");
                Access::Unknown
            }
        }
    }

    /// Enumerate a guild's channels (and optionally threads) and classify access.
    ///
    /// Failure to list the guild's channels is fatal for the guild. Thread
    /// listing failures are recorded as warnings and the affected threads are
    /// simply missing from this run.
    #[tracing::instrument(skip(self), fields(guild_id = %guild_id))]
    pub async fn discover(&self, guild_id: Snowflake, include_threads: bool) -> Result<ChannelDiscovery> {
        let channels = self.list_channels(guild_id).await?;
        let mut discovery = ChannelDiscovery::default();
        let mut seen: HashSet<Snowflake> = channels.iter().map(|c| c.id).collect();
        let mut threads: Vec<Raw<ApiChannel>> = Vec::new();

        if include_threads {
            match self.api.active_threads(guild_id).await {
                Ok(active) => threads.extend(active),
                Err(e) => discovery.warnings.push(listing_warning("active threads", &e)),
            }
            for parent in channels.iter().filter(|c| c.kind.has_threads()) {
                match self.list_archived_threads(parent).await {
                    Ok(archived) => threads.extend(archived),
                    Err(e) => discovery
                        .warnings
                        .push(listing_warning(&format!("archived threads of {}", parent.label()), &e)),
                }
            }
            threads.retain(|t| seen.insert(t.id));
        }

        let parents: HashMap<Snowflake, &Raw<ApiChannel>> =
            channels.iter().map(|c| (c.id, c)).collect();

        for channel in channels.iter().filter(|c| c.kind.has_messages()) {
            let access = self.check_access(channel, None).await;
            discovery.candidates.push(DiscoveredChannel {
                channel: channel.clone(),
                access,
            });
        }
        for thread in threads.iter().filter(|t| t.kind.has_messages()) {
            let parent = thread
                .parent_id
                .and_then(|id| parents.get(&id))
                .map(|p| &p.data);
            let access = self.check_access(thread, parent).await;
            discovery.candidates.push(DiscoveredChannel {
                channel: thread.clone(),
                access,
            });
        }

        discovery.thread_count = threads.len();
        discovery.all = channels;
        discovery.all.extend(threads);
        tracing::debug!(
            channels = discovery.all.len(),
            threads = discovery.thread_count,
            readable = discovery.readable(),
            "Channel discovery complete"
        );
        Ok(discovery)
    }
}

fn listing_warning(what: &str, error: &ApiError) -> String {
    tracing::warn!(error = %error, "Could not list {what}");
    format!("could not list {what}: {}", crate::api::short_error_message(error))
}

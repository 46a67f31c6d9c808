//! Channel permission evaluation.
//!
//! Computes what the current credential may do in a channel from the guild's roles,
//! the credential's member roles and the channel's permission overwrites, following
//! the server's documented resolution order.

use std::collections::HashSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::discord::{ApiChannel, ApiRole, OverwriteKind, PermissionOverwrite};
use crate::snowflake::Snowflake;

/// A permission bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u64::MAX);

    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const READ_MESSAGE_HISTORY: Self = Self(1 << 16);
    pub const CONNECT: Self = Self(1 << 20);
    pub const MANAGE_THREADS: Self = Self(1 << 34);

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Permissions {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

// Permission sets arrive as decimal strings since they outgrew 2^53.
impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PermissionsVisitor;

        impl Visitor<'_> for PermissionsVisitor {
            type Value = Permissions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a permission bit set as a string or integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Permissions, E> {
                Ok(Permissions(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Permissions, E> {
                u64::try_from(v)
                    .map(Permissions)
                    .map_err(|_| E::custom(format!("negative permissions: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Permissions, E> {
                v.trim()
                    .parse()
                    .map(Permissions)
                    .map_err(|_| E::custom(format!("invalid permissions: {v:?}")))
            }
        }

        deserializer.deserialize_any(PermissionsVisitor)
    }
}

/// Result of checking whether the credential can read a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Accessible,
    Forbidden,
    /// Could not be determined this run; skip and try again next run.
    Unknown,
}

/// Everything needed to evaluate channel permissions for one credential in one guild.
#[derive(Debug, Clone)]
pub struct PermissionContext {
    guild_id: Snowflake,
    user_id: Snowflake,
    member_roles: HashSet<Snowflake>,
    base: Permissions,
}

impl PermissionContext {
    /// Build the guild-level (base) permissions.
    ///
    /// The @everyone role shares the guild's id. The guild owner and holders of
    /// ADMINISTRATOR bypass every overwrite.
    pub fn new(
        guild_id: Snowflake,
        owner_id: Option<Snowflake>,
        user_id: Snowflake,
        roles: &[ApiRole],
        member_roles: &[Snowflake],
    ) -> Self {
        let member_roles: HashSet<Snowflake> = member_roles.iter().copied().collect();

        let base = if owner_id == Some(user_id) {
            Permissions::ALL
        } else {
            let base = roles
                .iter()
                .filter(|role| role.id == guild_id || member_roles.contains(&role.id))
                .fold(Permissions::NONE, |acc, role| acc | role.permissions);
            if base.contains(Permissions::ADMINISTRATOR) {
                Permissions::ALL
            } else {
                base
            }
        };

        Self {
            guild_id,
            user_id,
            member_roles,
            base,
        }
    }

    #[must_use]
    pub fn base(&self) -> Permissions {
        self.base
    }

    /// Apply a channel's overwrites on top of the base permissions.
    #[must_use]
    pub fn channel_permissions(&self, overwrites: &[PermissionOverwrite]) -> Permissions {
        if self.base == Permissions::ALL {
            return Permissions::ALL;
        }

        let mut perms = self.base;

        if let Some(everyone) = overwrites.iter().find(|o| o.id == self.guild_id) {
            perms = (perms & !everyone.deny) | everyone.allow;
        }

        let (deny, allow) = overwrites
            .iter()
            .filter(|o| {
                o.kind == OverwriteKind::Role
                    && o.id != self.guild_id
                    && self.member_roles.contains(&o.id)
            })
            .fold((Permissions::NONE, Permissions::NONE), |(deny, allow), o| {
                (deny | o.deny, allow | o.allow)
            });
        perms = (perms & !deny) | allow;

        if let Some(member) = overwrites
            .iter()
            .find(|o| o.kind == OverwriteKind::Member && o.id == self.user_id)
        {
            perms = (perms & !member.deny) | member.allow;
        }

        perms
    }

    /// Whether the credential can read `channel`'s message history.
    ///
    /// Threads carry no overwrites of their own and inherit their parent's.
    #[must_use]
    pub fn can_read(&self, channel: &ApiChannel, parent: Option<&ApiChannel>) -> bool {
        let overwrites = match (channel.kind.is_thread(), parent) {
            (true, Some(parent)) => &parent.permission_overwrites,
            _ => &channel.permission_overwrites,
        };
        let perms = self.channel_permissions(overwrites);

        let mut required = Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY;
        if channel.kind.requires_connect() {
            required = required | Permissions::CONNECT;
        }
        perms.contains(required)
    }

    /// Private archived threads are only listed for moderators of the parent.
    #[must_use]
    pub fn can_list_private_threads(&self, channel: &ApiChannel) -> bool {
        self.channel_permissions(&channel.permission_overwrites)
            .contains(Permissions::MANAGE_THREADS | Permissions::READ_MESSAGE_HISTORY)
    }
}

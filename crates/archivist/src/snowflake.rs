//! Discord snowflake identifiers.
//!
//! A snowflake packs a millisecond timestamp (relative to the Discord epoch) into
//! its upper 42 bits, so numeric order is creation order. Both sync engines rely on
//! this to pick "oldest" and "newest" out of a page and to build pagination cursors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Milliseconds between the Unix epoch and the first second of 2015.
pub const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

const TIMESTAMP_SHIFT: u32 = 22;

/// A Discord identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(pub u64);

impl Snowflake {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Database representation. Snowflakes stay below 2^63 for the lifetime of the
    /// format, so the conversion is lossless in practice.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }

    #[must_use]
    pub fn from_i64(id: i64) -> Self {
        Self(u64::try_from(id).unwrap_or_default())
    }

    /// Creation time encoded in the identifier.
    #[must_use]
    pub fn timestamp(self) -> DateTime<Utc> {
        let ms = (self.0 >> TIMESTAMP_SHIFT) + DISCORD_EPOCH_MS;
        Utc.timestamp_millis_opt(i64::try_from(ms).unwrap_or(i64::MAX))
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Smallest snowflake that could have been created at `at`.
    ///
    /// Useful as a `before`/`after` cursor derived from wall-clock time.
    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        let ms = u64::try_from(at.timestamp_millis()).unwrap_or_default();
        Self(ms.saturating_sub(DISCORD_EPOCH_MS) << TIMESTAMP_SHIFT)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// The API sends identifiers as strings; older payloads and hand-written fixtures
// sometimes use bare numbers.
impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a snowflake as a string or integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                u64::try_from(v)
                    .map(Snowflake)
                    .map_err(|_| E::custom(format!("negative snowflake: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.parse()
                    .map_err(|_| E::custom(format!("invalid snowflake: {v:?}")))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_of_known_id() {
        // Example id from the API reference docs: 2016-04-30 11:18:25.796 UTC
        let id = Snowflake(175_928_847_299_117_063);
        assert_eq!(id.timestamp().timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn test_from_timestamp_round_trips_to_millisecond() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = Snowflake::from_timestamp(at);
        assert_eq!(id.timestamp(), at);
        assert_eq!(id.get() & ((1 << TIMESTAMP_SHIFT) - 1), 0);
    }

    #[test]
    fn test_from_timestamp_before_epoch_saturates() {
        let at = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(Snowflake::from_timestamp(at), Snowflake(0));
    }

    #[test]
    fn test_ordering_follows_creation_time() {
        let older = Snowflake::from_timestamp(Utc.timestamp_millis_opt(1_600_000_000_000).unwrap());
        let newer = Snowflake::from_timestamp(Utc.timestamp_millis_opt(1_600_000_000_001).unwrap());
        assert!(older < newer);
    }

    #[test]
    fn test_deserialize_string_and_number() {
        let from_str: Snowflake = serde_json::from_value(json!("81384788765712384")).unwrap();
        let from_num: Snowflake = serde_json::from_value(json!(81384788765712384_u64)).unwrap();
        assert_eq!(from_str, from_num);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(serde_json::from_value::<Snowflake>(json!("abc")).is_err());
        assert!(serde_json::from_value::<Snowflake>(json!(-5)).is_err());
        assert!(serde_json::from_value::<Snowflake>(json!(null)).is_err());
    }

    #[test]
    fn test_serialize_as_string() {
        assert_eq!(serde_json::to_value(Snowflake(42)).unwrap(), json!("42"));
    }

    #[test]
    fn test_i64_conversion() {
        assert_eq!(Snowflake(7).as_i64(), 7);
        assert_eq!(Snowflake::from_i64(7), Snowflake(7));
        assert_eq!(Snowflake::from_i64(-1), Snowflake(0));
    }
}

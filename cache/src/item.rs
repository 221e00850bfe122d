//! The stored envelope: a value plus an optional absolute expiration.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Envelope stored for every key. `expire_at` is carried on the wire as
/// unix milliseconds; absent or zero means "never expires".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub data: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "unix_millis"
    )]
    pub expire_at: Option<DateTime<Utc>>,
}

impl Item {
    /// An item without expiration.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            expire_at: None,
        }
    }

    /// An item expiring `ttl` from now.
    pub fn with_ttl(data: impl Into<String>, ttl: Duration) -> Self {
        Self {
            data: data.into(),
            expire_at: Some(deadline(Utc::now(), ttl)),
        }
    }

    /// Serialize to the storage blob.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a storage blob. Values written before the envelope
    /// existed are raw strings; they decode as data with no expiration, so
    /// decoding is total.
    pub fn decode(blob: &[u8]) -> Item {
        match serde_json::from_slice(blob) {
            Ok(item) => item,
            Err(_) => Item {
                data: String::from_utf8_lossy(blob).into_owned(),
                expire_at: None,
            },
        }
    }

    /// The liveness predicate: a non-live item must be treated as if the
    /// key does not exist, by every operation.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expire_at {
            None => true,
            Some(at) => now < at,
        }
    }

    /// Time left until expiration, or `None` when the item never expires.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expire_at
            .map(|at| (at - now).to_std().unwrap_or_default())
    }
}

/// Absolute expiration instant for a TTL starting now. Saturates instead of
/// overflowing for absurd durations.
pub(crate) fn deadline(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let delta = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

mod unix_millis {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        v: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match v {
            Some(at) => serializer.serialize_some(&at.timestamp_millis()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
        let millis = Option::<i64>::deserialize(deserializer)?;
        Ok(millis.and_then(|ms| {
            if ms == 0 {
                return None;
            }
            Utc.timestamp_millis_opt(ms).single()
        }))
    }
}

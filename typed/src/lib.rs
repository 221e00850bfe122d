//! Typed accessors, serialization helpers, and a rate limiter over any
//! [`Store`].
//!
//! Everything here is built purely from the base capability surface; no
//! method talks to an engine directly, so the decorator works identically
//! on every backend. Missing keys surface as [`hoard_cache::Error::NotFound`]
//! with no value, letting callers distinguish "missing" from
//! "present but not the expected shape".

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;

use hoard_cache::{Error, Result, Store};

/// Decorator methods available on every [`Store`].
pub trait StoreExt: Store {
    /// Permissive boolean read: `1`, `t`, `true`, `y`, `yes`, `on` (any
    /// case) are true, anything else is false.
    fn get_bool(&self, key: &str) -> Result<bool> {
        Ok(parse_bool(&self.get(key)?))
    }

    /// Integer read; non-numeric data is zero, never an error, matching
    /// counter semantics.
    fn get_i64(&self, key: &str) -> Result<i64> {
        Ok(self.get(key)?.trim().parse().unwrap_or(0))
    }

    fn get_u64(&self, key: &str) -> Result<u64> {
        Ok(self.get(key)?.trim().parse().unwrap_or(0))
    }

    fn get_f64(&self, key: &str) -> Result<f64> {
        Ok(self.get(key)?.trim().parse().unwrap_or(0.0))
    }

    /// Slice read: the stored value must be a JSON array. An empty string
    /// decodes to an empty vec; any other invalid JSON is an error.
    fn get_slice<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let raw = self.get(key)?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Store any serializable value as JSON.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.set(key, &data)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        serde_json::from_str(&self.get(key)?).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Store any serializable value as a binary message (MessagePack),
    /// base64-armored through the string-valued store surface.
    fn set_msg<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes =
            rmp_serde::to_vec_named(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.set(key, &STANDARD.encode(bytes))
    }

    fn get_msg<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw = self.get(key)?;
        let bytes = STANDARD
            .decode(raw.as_bytes())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        rmp_serde::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Fixed-window rate limiter: the window is armed by the first hit and
    /// not refreshed afterwards; once it elapses the count resets.
    /// Returns whether this call is within the limit.
    fn limit(&self, key: &str, limit: i64, window: Duration) -> Result<bool> {
        let count = self.incr(key)?;
        if count == 1 {
            self.expire(key, window)?;
        }
        Ok(count <= limit)
    }

    /// [`StoreExt::limit`] that re-arms the window on every check, so
    /// sustained traffic keeps it open until traffic stops for `window`.
    fn limit_update_on_check(&self, key: &str, limit: i64, window: Duration) -> Result<bool> {
        let count = self.incr(key)?;
        self.expire(key, window)?;
        Ok(count <= limit)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "t" | "true" | "y" | "yes" | "on"
    )
}

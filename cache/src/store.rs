//! The base capability surface every backend satisfies.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Live with no expiration.
    None,
    /// Absent or expired.
    Missing,
    /// Live, expires after the contained duration.
    Remaining(Duration),
}

/// The contract every backend and every decorator consumer honors.
///
/// All calls are synchronous and may block for the duration of engine I/O.
/// Keys absent or past their expiration are indistinguishable from keys
/// never written: `get` returns [`crate::Error::NotFound`], `ttl` returns
/// [`Ttl::Missing`], enumerations return empty.
pub trait Store: Send + Sync {
    /// Value at `key`, or `NotFound`.
    fn get(&self, key: &str) -> Result<String>;

    /// Upsert without expiration.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Upsert expiring `ttl` from now.
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Set only if the key is absent or expired. Reports whether it set.
    fn set_nx(&self, key: &str, value: &str) -> Result<bool>;

    /// [`Store::set_nx`] that also arms `ttl` on success.
    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Remaining lifetime of `key`.
    fn ttl(&self, key: &str) -> Result<Ttl>;

    /// Arm `ttl` on a live key. Returns false when the key is absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1)
    }

    fn decr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, -1)
    }

    /// Add `delta` to the counter at `key` and return the new value. Absent
    /// or non-numeric state counts from zero; this never errors on bad data.
    fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.incr_by(key, delta.saturating_neg())
    }

    /// True only if every listed key is live.
    fn exists(&self, keys: &[&str]) -> Result<bool>;

    /// Set one hash field. Returns true when the field was new.
    fn h_set(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    /// Value of one hash field, or `NotFound`.
    fn h_get(&self, key: &str, field: &str) -> Result<String>;

    /// Remove the listed fields. Returns the count actually removed.
    fn h_del(&self, key: &str, fields: &[&str]) -> Result<u64>;

    /// All field names of the hash. Empty for an absent or expired hash.
    fn h_keys(&self, key: &str) -> Result<Vec<String>>;

    /// All fields and values of the hash.
    fn h_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    fn h_exists(&self, key: &str, field: &str) -> Result<bool>;

    fn h_incr(&self, key: &str, field: &str) -> Result<i64> {
        self.h_incr_by(key, field, 1)
    }

    /// Counter semantics of [`Store::incr_by`], at field granularity.
    fn h_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    fn h_decr(&self, key: &str, field: &str) -> Result<i64> {
        self.h_incr_by(key, field, -1)
    }

    fn h_decr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.h_incr_by(key, field, delta.saturating_neg())
    }

    /// Add members to the set. Returns how many were not already present;
    /// duplicates within one call count once.
    fn s_add(&self, key: &str, members: &[&str]) -> Result<u64>;

    /// All members. Empty for an absent or expired set.
    fn s_members(&self, key: &str) -> Result<Vec<String>>;

    /// Remove the listed members. Returns the count actually removed.
    fn s_rem(&self, key: &str, members: &[&str]) -> Result<u64>;

    /// Up to `count` random members; `count <= 0` yields exactly one, a
    /// count at or above the set size yields the whole set.
    fn s_rand_member(&self, key: &str, count: i64) -> Result<Vec<String>>;

    /// Remove and return one arbitrary member, or `None` on an empty or
    /// absent set.
    fn s_pop(&self, key: &str) -> Result<Option<String>>;

    fn s_is_member(&self, key: &str, member: &str) -> Result<bool>;

    /// Unconditionally delete the listed logical keys, including their hash
    /// and set payloads. Missing keys are ignored.
    fn del(&self, keys: &[&str]) -> Result<()>;

    /// Wipe every entry owned by this backend instance.
    fn clean(&self) -> Result<()>;

    /// Release engine resources. Later calls fail with an engine error.
    fn close(&self) -> Result<()>;
}

impl fmt::Debug for dyn Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Store {{ ... }}")
    }
}

/// A boxed store for use in trait objects.
pub type BoxedStore = Box<dyn Store>;

//! The generic emulation layer: full data-model semantics over any engine.
//!
//! Hash, set, counter, and TTL behavior is written once here and is
//! identical for every engine; the engines only supply get/put/delete,
//! prefix scan, and an atomic batch. Read-modify-write sequences are
//! serialized by one process-local mutex; across processes a logical
//! mutation is only as atomic as one engine call, which is a documented
//! limitation rather than something this layer solves.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hoard_kv::{Batch, Engine};
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::item::{deadline, Item};
use crate::keys;
use crate::store::{Store, Ttl};
use crate::sweep::SweepGate;

/// How a hash is laid out in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashLayout {
    /// The whole hash is one JSON object blob at `{key}:hash`. Every
    /// mutation rewrites the blob; an accepted scalability ceiling.
    Blob,
    /// One entry per field at `{key}:hash:{field}`, enumerated by prefix
    /// scan. Multi-field mutations go through one atomic batch.
    Fielded,
}

const SWEEP_TOKENS: u32 = 2;
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A [`Store`] built from a minimal [`Engine`].
pub struct Cache<E: Engine> {
    engine: E,
    layout: HashLayout,
    sweep: SweepGate,
    // Serializes read-modify-write sequences within this process.
    write_lock: Mutex<()>,
}

impl<E: Engine> Cache<E> {
    pub fn new(engine: E, layout: HashLayout) -> Self {
        Self {
            engine,
            layout,
            sweep: SweepGate::new(SWEEP_TOKENS, SWEEP_INTERVAL),
            write_lock: Mutex::new(()),
        }
    }

    /// Direct engine access, for adapters and tests.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Load the live item at a physical key. Expired items read as absent.
    fn load(&self, key: &str) -> Result<Option<Item>> {
        match self.engine.get(key)? {
            Some(blob) => {
                let item = Item::decode(&blob);
                if item.is_live(Utc::now()) {
                    Ok(Some(item))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn store_item(&self, key: &str, item: &Item) -> Result<()> {
        self.engine.put(key, &item.encode()?)?;
        Ok(())
    }

    /// Hash payload in the blob layout, with the blob's own expiration so
    /// mutations preserve it.
    fn load_hash_blob(&self, key: &str) -> Result<(HashMap<String, String>, Option<DateTime<Utc>>)> {
        match self.load(&keys::hash_blob_key(key))? {
            Some(item) => Ok((decode_object(&item.data), item.expire_at)),
            None => Ok((HashMap::new(), None)),
        }
    }

    fn store_hash_blob(
        &self,
        key: &str,
        map: &HashMap<String, String>,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let blob_key = keys::hash_blob_key(key);
        if map.is_empty() {
            self.engine.delete(&blob_key)?;
            return Ok(());
        }
        let data = serde_json::to_string(map).map_err(|e| Error::Serialization(e.to_string()))?;
        self.store_item(&blob_key, &Item { data, expire_at })
    }

    /// Set membership map, degrading to empty on corruption or expiry.
    fn load_set(&self, key: &str) -> Result<(HashMap<String, bool>, Option<DateTime<Utc>>)> {
        match self.load(&keys::set_key(key))? {
            Some(item) => Ok((decode_object(&item.data), item.expire_at)),
            None => Ok((HashMap::new(), None)),
        }
    }

    fn store_set(
        &self,
        key: &str,
        members: &HashMap<String, bool>,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let set_key = keys::set_key(key);
        if members.is_empty() {
            self.engine.delete(&set_key)?;
            return Ok(());
        }
        let data =
            serde_json::to_string(members).map_err(|e| Error::Serialization(e.to_string()))?;
        self.store_item(&set_key, &Item { data, expire_at })
    }

    /// Counter read-modify-write at one physical key.
    fn incr_item(&self, key: &str, delta: i64) -> Result<i64> {
        let existing = self.load(key)?;
        let current = existing
            .as_ref()
            .map(|item| parse_counter(&item.data))
            .unwrap_or(0);
        let next = current.saturating_add(delta);
        let item = Item {
            data: next.to_string(),
            expire_at: existing.and_then(|item| item.expire_at),
        };
        self.store_item(key, &item)?;
        Ok(next)
    }

    /// Opportunistic expired-entry sweep, gated by the token bucket. Lazy
    /// expiration on read remains the correctness backstop, so failures are
    /// logged and swallowed.
    fn maybe_sweep(&self) {
        if !self.sweep.try_acquire() {
            return;
        }
        if let Err(e) = self.sweep_expired() {
            warn!(error = %e, "expired-key sweep failed");
        }
    }

    fn sweep_expired(&self) -> Result<()> {
        let now = Utc::now();
        let mut batch = Batch::new();
        for (key, blob) in self.engine.scan_prefix("")? {
            if !Item::decode(&blob).is_live(now) {
                batch.delete(key);
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        debug!(expired = batch.len(), "sweeping expired keys");
        self.engine.apply(batch)?;
        Ok(())
    }
}

impl<E: Engine> Store for Cache<E> {
    fn get(&self, key: &str) -> Result<String> {
        match self.load(key)? {
            Some(item) => Ok(item.data),
            None => Err(Error::NotFound),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.maybe_sweep();
        self.store_item(key, &Item::new(value))
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.maybe_sweep();
        self.store_item(key, &Item::with_ttl(value, ttl))
    }

    fn set_nx(&self, key: &str, value: &str) -> Result<bool> {
        self.maybe_sweep();
        let _guard = self.write_lock.lock();
        if self.load(key)?.is_some() {
            return Ok(false);
        }
        self.store_item(key, &Item::new(value))?;
        Ok(true)
    }

    fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.maybe_sweep();
        let _guard = self.write_lock.lock();
        if self.load(key)?.is_some() {
            return Ok(false);
        }
        self.store_item(key, &Item::with_ttl(value, ttl))?;
        Ok(true)
    }

    fn ttl(&self, key: &str) -> Result<Ttl> {
        match self.load(key)? {
            None => Ok(Ttl::Missing),
            Some(item) => match item.remaining(Utc::now()) {
                None => Ok(Ttl::None),
                Some(d) => Ok(Ttl::Remaining(d)),
            },
        }
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let _guard = self.write_lock.lock();
        match self.load(key)? {
            None => Ok(false),
            Some(mut item) => {
                item.expire_at = Some(deadline(Utc::now(), ttl));
                self.store_item(key, &item)?;
                Ok(true)
            }
        }
    }

    fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.maybe_sweep();
        let _guard = self.write_lock.lock();
        self.incr_item(key, delta)
    }

    fn exists(&self, keys_: &[&str]) -> Result<bool> {
        for key in keys_ {
            if self.load(key)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn h_set(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.maybe_sweep();
        let _guard = self.write_lock.lock();
        match self.layout {
            HashLayout::Blob => {
                let (mut map, expire_at) = self.load_hash_blob(key)?;
                let was_new = map.insert(field.to_string(), value.to_string()).is_none();
                self.store_hash_blob(key, &map, expire_at)?;
                Ok(was_new)
            }
            HashLayout::Fielded => {
                let field_key = keys::hash_field_key(key, field);
                let was_new = self.load(&field_key)?.is_none();
                self.store_item(&field_key, &Item::new(value))?;
                Ok(was_new)
            }
        }
    }

    fn h_get(&self, key: &str, field: &str) -> Result<String> {
        match self.layout {
            HashLayout::Blob => {
                let (map, _) = self.load_hash_blob(key)?;
                map.get(field).cloned().ok_or(Error::NotFound)
            }
            HashLayout::Fielded => match self.load(&keys::hash_field_key(key, field))? {
                Some(item) => Ok(item.data),
                None => Err(Error::NotFound),
            },
        }
    }

    fn h_del(&self, key: &str, fields: &[&str]) -> Result<u64> {
        let _guard = self.write_lock.lock();
        match self.layout {
            HashLayout::Blob => {
                let (mut map, expire_at) = self.load_hash_blob(key)?;
                let mut removed = 0;
                for field in fields {
                    if map.remove(*field).is_some() {
                        removed += 1;
                    }
                }
                if removed > 0 {
                    self.store_hash_blob(key, &map, expire_at)?;
                }
                Ok(removed)
            }
            HashLayout::Fielded => {
                let mut batch = Batch::new();
                let mut removed = 0;
                for field in fields {
                    let field_key = keys::hash_field_key(key, field);
                    if self.load(&field_key)?.is_some() {
                        batch.delete(field_key);
                        removed += 1;
                    }
                }
                if !batch.is_empty() {
                    self.engine.apply(batch)?;
                }
                Ok(removed)
            }
        }
    }

    fn h_keys(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.h_get_all(key)?.into_keys().collect())
    }

    fn h_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        match self.layout {
            HashLayout::Blob => Ok(self.load_hash_blob(key)?.0),
            HashLayout::Fielded => {
                let prefix = keys::hash_prefix(key);
                let now = Utc::now();
                let mut map = HashMap::new();
                for (stored_key, blob) in self.engine.scan_prefix(&prefix)? {
                    let item = Item::decode(&blob);
                    if !item.is_live(now) {
                        continue;
                    }
                    map.insert(keys::field_name(&stored_key, &prefix).to_string(), item.data);
                }
                Ok(map)
            }
        }
    }

    fn h_exists(&self, key: &str, field: &str) -> Result<bool> {
        match self.h_get(key, field) {
            Ok(_) => Ok(true),
            Err(Error::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn h_incr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.maybe_sweep();
        let _guard = self.write_lock.lock();
        match self.layout {
            HashLayout::Blob => {
                let (mut map, expire_at) = self.load_hash_blob(key)?;
                let current = map.get(field).map(|v| parse_counter(v)).unwrap_or(0);
                let next = current.saturating_add(delta);
                map.insert(field.to_string(), next.to_string());
                self.store_hash_blob(key, &map, expire_at)?;
                Ok(next)
            }
            HashLayout::Fielded => self.incr_item(&keys::hash_field_key(key, field), delta),
        }
    }

    fn s_add(&self, key: &str, members: &[&str]) -> Result<u64> {
        self.maybe_sweep();
        let _guard = self.write_lock.lock();
        let (mut set, expire_at) = self.load_set(key)?;
        let mut added = 0;
        for member in members {
            if set.insert((*member).to_string(), true).is_none() {
                added += 1;
            }
        }
        if added > 0 {
            self.store_set(key, &set, expire_at)?;
        }
        Ok(added)
    }

    fn s_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.load_set(key)?.0.into_keys().collect())
    }

    fn s_rem(&self, key: &str, members: &[&str]) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let (mut set, expire_at) = self.load_set(key)?;
        let mut removed = 0;
        for member in members {
            if set.remove(*member).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.store_set(key, &set, expire_at)?;
        }
        Ok(removed)
    }

    fn s_rand_member(&self, key: &str, count: i64) -> Result<Vec<String>> {
        let (set, _) = self.load_set(key)?;
        if set.is_empty() {
            return Ok(Vec::new());
        }
        let want = if count <= 0 { 1 } else { count as usize };
        let mut rng = rand::thread_rng();
        Ok(set.into_keys().choose_multiple(&mut rng, want))
    }

    fn s_pop(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.write_lock.lock();
        let (mut set, expire_at) = self.load_set(key)?;
        let picked = {
            let mut rng = rand::thread_rng();
            set.keys().choose(&mut rng).cloned()
        };
        let Some(member) = picked else {
            return Ok(None);
        };
        set.remove(&member);
        self.store_set(key, &set, expire_at)?;
        Ok(Some(member))
    }

    fn s_is_member(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.load_set(key)?.0.contains_key(member))
    }

    fn del(&self, keys_: &[&str]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut batch = Batch::new();
        for key in keys_ {
            batch.delete(*key);
            batch.delete(keys::hash_blob_key(key));
            batch.delete(keys::set_key(key));
            if self.layout == HashLayout::Fielded {
                for (stored_key, _) in self.engine.scan_prefix(&keys::hash_prefix(key))? {
                    batch.delete(stored_key);
                }
            }
        }
        self.engine.apply(batch)?;
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        self.engine.clear()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.engine.close()?;
        Ok(())
    }
}

/// Counter state of a stored value. Non-numeric data counts from zero.
fn parse_counter(data: &str) -> i64 {
    data.trim().parse().unwrap_or(0)
}

/// Decode a JSON object payload. Corrupted payloads degrade to empty, never
/// to a hard failure.
fn decode_object<V: serde::de::DeserializeOwned>(data: &str) -> HashMap<String, V> {
    serde_json::from_str(data).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_kv::MemoryEngine;

    fn memory_cache() -> Cache<MemoryEngine> {
        Cache::new(MemoryEngine::new(), HashLayout::Blob)
    }

    #[test]
    fn counter_treats_garbage_as_zero() {
        let cache = memory_cache();
        cache.set("n", "not a number").unwrap();
        assert_eq!(cache.incr("n").unwrap(), 1);
        assert_eq!(cache.incr_by("n", 4).unwrap(), 5);
    }

    #[test]
    fn counter_preserves_expiration() {
        let cache = memory_cache();
        cache.set_ex("n", "0", Duration::from_secs(60)).unwrap();
        cache.incr("n").unwrap();
        assert!(matches!(cache.ttl("n").unwrap(), Ttl::Remaining(_)));
    }

    #[test]
    fn corrupted_hash_blob_reads_as_empty() {
        let cache = memory_cache();
        cache
            .engine()
            .put(&keys::hash_blob_key("h"), b"definitely not json")
            .unwrap();
        assert!(cache.h_get_all("h").unwrap().is_empty());
        assert!(cache.h_keys("h").unwrap().is_empty());
    }

    #[test]
    fn corrupted_set_blob_reads_as_empty() {
        let cache = memory_cache();
        cache
            .engine()
            .put(&keys::set_key("s"), b"definitely not json")
            .unwrap();
        assert!(cache.s_members("s").unwrap().is_empty());
        assert!(!cache.s_is_member("s", "a").unwrap());
    }

    #[test]
    fn raw_scalar_falls_back_to_plain_string() {
        let cache = memory_cache();
        cache.engine().put("legacy", b"raw bytes").unwrap();
        assert_eq!(cache.get("legacy").unwrap(), "raw bytes");
    }

    #[test]
    fn fielded_layout_matches_blob_semantics() {
        let blob = Cache::new(MemoryEngine::new(), HashLayout::Blob);
        let fielded = Cache::new(MemoryEngine::new(), HashLayout::Fielded);

        for cache in [&blob, &fielded] {
            assert!(cache.h_set("h", "f1", "v1").unwrap());
            assert!(!cache.h_set("h", "f1", "v2").unwrap());
            assert!(cache.h_set("h", "f2", "x").unwrap());
            assert_eq!(cache.h_get("h", "f1").unwrap(), "v2");
            assert_eq!(cache.h_get_all("h").unwrap().len(), 2);
            assert_eq!(cache.h_del("h", &["f1", "missing"]).unwrap(), 1);
            assert!(!cache.h_exists("h", "f1").unwrap());
            assert_eq!(cache.h_incr_by("h", "count", 3).unwrap(), 3);
        }
    }

    #[test]
    fn sweep_reclaims_expired_entries() {
        let cache = memory_cache();
        cache
            .set_ex("gone", "x", Duration::from_millis(10))
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        cache.sweep_expired().unwrap();
        // Physically removed, not just hidden by the liveness check.
        assert_eq!(cache.engine().get("gone").unwrap(), None);
    }
}

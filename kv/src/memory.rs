//! In-process engine backed by an ordered map behind one reader/writer lock.
//!
//! Reads take the shared lock, every mutation takes the exclusive lock.
//! There is no finer-grained sharding.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::{Batch, BatchOp, Engine, EngineError, EngineResult};

/// An in-process key-value engine. `None` models the closed state.
pub struct MemoryEngine {
    data: RwLock<Option<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryEngine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Some(BTreeMap::new())),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let guard = self.data.read();
        let map = guard.as_ref().ok_or(EngineError::Closed)?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()> {
        let mut guard = self.data.write();
        let map = guard.as_mut().ok_or(EngineError::Closed)?;
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> EngineResult<()> {
        let mut guard = self.data.write();
        let map = guard.as_mut().ok_or(EngineError::Closed)?;
        map.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>> {
        let guard = self.data.read();
        let map = guard.as_ref().ok_or(EngineError::Closed)?;
        let range = (Bound::Included(prefix.to_string()), Bound::Unbounded);
        Ok(map
            .range::<String, _>(range)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&self, batch: Batch) -> EngineResult<()> {
        let mut guard = self.data.write();
        let map = guard.as_mut().ok_or(EngineError::Closed)?;
        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    map.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        let mut guard = self.data.write();
        let map = guard.as_mut().ok_or(EngineError::Closed)?;
        map.clear();
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        *self.data.write() = None;
        Ok(())
    }
}

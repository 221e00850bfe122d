//! Log-structured-merge file engine backed by sled.
//!
//! Concurrency is delegated to sled's internal locking; the adapter adds
//! nothing on top. Writes are made durable by sled's background flusher and
//! an explicit flush on close.

use std::path::Path;

use parking_lot::RwLock;

use crate::{storage, Batch, BatchOp, Engine, EngineError, EngineResult};

/// A persistent engine backed by a sled tree.
pub struct SledEngine {
    db: RwLock<Option<sled::Db>>,
}

impl SledEngine {
    /// Open or create a sled database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let db = sled::open(path).map_err(storage)?;
        Ok(Self {
            db: RwLock::new(Some(db)),
        })
    }
}

impl Engine for SledEngine {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;
        Ok(db.get(key).map_err(storage)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;
        db.insert(key, value).map_err(storage)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;
        db.remove(key).map_err(storage)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        let mut results = Vec::new();
        for item in db.scan_prefix(prefix) {
            let (key, value) = item.map_err(storage)?;
            results.push((String::from_utf8_lossy(&key).into_owned(), value.to_vec()));
        }
        Ok(results)
    }

    fn apply(&self, batch: Batch) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        let mut native = sled::Batch::default();
        for op in batch {
            match op {
                BatchOp::Put(key, value) => native.insert(key.into_bytes(), value),
                BatchOp::Delete(key) => native.remove(key.into_bytes()),
            }
        }
        db.apply_batch(native).map_err(storage)?;
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;
        db.clear().map_err(storage)?;
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        if let Some(db) = self.db.write().take() {
            db.flush().map_err(storage)?;
        }
        Ok(())
    }
}

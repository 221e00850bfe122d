//! Transactional B+tree file engine backed by redb.
//!
//! One database file, one table. Every operation is a single read or write
//! transaction, so a batch is atomic from the engine's point of view.

use std::path::Path;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};

use crate::{storage, Batch, BatchOp, Engine, EngineError, EngineResult};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cache");

/// A persistent engine backed by a redb database file.
pub struct RedbEngine {
    db: RwLock<Option<Database>>,
}

impl RedbEngine {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let db = Database::create(path).map_err(storage)?;

        // Create the table up front so reads never race its existence.
        let tx = db.begin_write().map_err(storage)?;
        {
            let _ = tx.open_table(TABLE).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;

        Ok(Self {
            db: RwLock::new(Some(db)),
        })
    }
}

impl Engine for RedbEngine {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        let tx = db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;
        match table.get(key).map_err(storage)? {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        let tx = db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            table.insert(key, value).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        let tx = db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            table.remove(key).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        let tx = db.begin_read().map_err(storage)?;
        let table = tx.open_table(TABLE).map_err(storage)?;

        let mut results = Vec::new();
        for item in table.range(prefix..).map_err(storage)? {
            let (key, value) = item.map_err(storage)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }

    fn apply(&self, batch: Batch) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        let tx = db.begin_write().map_err(storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(storage)?;
            for op in batch {
                match op {
                    BatchOp::Put(key, value) => {
                        table
                            .insert(key.as_str(), value.as_slice())
                            .map_err(storage)?;
                    }
                    BatchOp::Delete(key) => {
                        table.remove(key.as_str()).map_err(storage)?;
                    }
                }
            }
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(EngineError::Closed)?;

        // Dropping and recreating the table wipes it in one transaction.
        let tx = db.begin_write().map_err(storage)?;
        tx.delete_table(TABLE).map_err(storage)?;
        {
            let _ = tx.open_table(TABLE).map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        self.db.write().take();
        Ok(())
    }
}

//! Minimal storage engine capability and embedded engine adapters.
//!
//! Everything higher up (expiration, counters, hashes, sets) is built on the
//! small [`Engine`] contract defined here: byte-valued get/put/delete, an
//! ordered prefix scan, and an atomic batch. Four engines implement it:
//!
//! - [`MemoryEngine`]: an in-process map behind one reader/writer lock
//! - [`RedbEngine`]: a single-table transactional B+tree file store
//! - [`SledEngine`]: a log-structured-merge file store
//! - [`LogEngine`]: an append-only record log with an in-memory index

pub mod log;
pub mod memory;
pub mod redb;
pub mod sled;

use std::fmt;
use thiserror::Error;

/// Errors surfaced by storage engines.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine handle was released by `close`.
    #[error("engine: closed")]
    Closed,

    #[error("engine: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine: storage error: {0}")]
    Storage(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// One operation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put(String, Vec<u8>),
    Delete(String),
}

/// An ordered list of writes an engine applies as one atomic unit.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BatchOp> {
        self.ops.iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a BatchOp;
    type IntoIter = std::slice::Iter<'a, BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl IntoIterator for Batch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Minimal capability every storage engine supplies.
///
/// Keys are UTF-8 strings, values opaque bytes. Deleting a missing key is
/// not an error. After [`Engine::close`] every operation returns
/// [`EngineError::Closed`] instead of panicking or hanging.
pub trait Engine: Send + Sync {
    /// Get the value stored at a key.
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>>;

    /// Insert or overwrite a key-value pair.
    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()>;

    /// Delete a key. Missing keys are ignored.
    fn delete(&self, key: &str) -> EngineResult<()>;

    /// Return all entries whose key starts with `prefix`, key-ascending.
    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>>;

    /// Apply every operation in the batch as one atomic unit.
    fn apply(&self, batch: Batch) -> EngineResult<()>;

    /// Remove every entry owned by this engine instance.
    fn clear(&self) -> EngineResult<()>;

    /// Release the underlying handle. Idempotent; later data operations
    /// return [`EngineError::Closed`].
    fn close(&self) -> EngineResult<()>;
}

impl fmt::Debug for dyn Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Engine {{ ... }}")
    }
}

/// A boxed engine for use in trait objects.
pub type BoxedEngine = Box<dyn Engine>;

/// Map a foreign engine error into [`EngineError::Storage`].
pub(crate) fn storage<E: fmt::Display>(e: E) -> EngineError {
    EngineError::Storage(e.to_string())
}

pub use self::log::LogEngine;
pub use self::memory::MemoryEngine;
pub use self::redb::RedbEngine;
pub use self::sled::SledEngine;

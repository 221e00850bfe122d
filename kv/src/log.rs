//! Append-only record log engine.
//!
//! Every put/delete appends one record; an in-memory index, rebuilt by
//! replaying the log at open, serves reads and scans. A torn record at the
//! tail (an interrupted write) is truncated away at open; everything before
//! it is recovered.
//!
//! Record layout: `op: u8, key_len: u32 LE, value_len: u32 LE, key, value`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use crate::{Batch, BatchOp, Engine, EngineError, EngineResult};

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

const HEADER_LEN: usize = 9;

struct Inner {
    writer: BufWriter<File>,
    index: BTreeMap<String, Vec<u8>>,
}

/// A persistent engine backed by an append-only record log.
pub struct LogEngine {
    inner: Mutex<Option<Inner>>,
}

impl LogEngine {
    /// Open or create a log file at the given path and replay it.
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let (index, valid_len) = replay(&mut file)?;
        if valid_len < file.metadata()?.len() {
            // Drop the torn tail so later appends stay parseable.
            file.set_len(valid_len)?;
        }
        file.seek(SeekFrom::End(0))?;
        debug!(entries = index.len(), "append log replayed");

        Ok(Self {
            inner: Mutex::new(Some(Inner {
                writer: BufWriter::new(file),
                index,
            })),
        })
    }
}

impl Engine for LogEngine {
    fn get(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let guard = self.inner.lock();
        let inner = guard.as_ref().ok_or(EngineError::Closed)?;
        Ok(inner.index.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> EngineResult<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(EngineError::Closed)?;
        append(&mut inner.writer, OP_PUT, key, value)?;
        inner.writer.flush()?;
        inner.index.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> EngineResult<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(EngineError::Closed)?;
        if inner.index.remove(key).is_some() {
            append(&mut inner.writer, OP_DELETE, key, b"")?;
            inner.writer.flush()?;
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> EngineResult<Vec<(String, Vec<u8>)>> {
        let guard = self.inner.lock();
        let inner = guard.as_ref().ok_or(EngineError::Closed)?;
        let range = (Bound::Included(prefix.to_string()), Bound::Unbounded);
        Ok(inner
            .index
            .range::<String, _>(range)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&self, batch: Batch) -> EngineResult<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(EngineError::Closed)?;

        // All records land in the writer buffer, then one flush. On a crash
        // mid-batch the torn tail is truncated at the next open.
        for op in &batch {
            match op {
                BatchOp::Put(key, value) => append(&mut inner.writer, OP_PUT, key, value)?,
                BatchOp::Delete(key) => append(&mut inner.writer, OP_DELETE, key, b"")?,
            }
        }
        inner.writer.flush()?;

        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    inner.index.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    inner.index.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn clear(&self) -> EngineResult<()> {
        let mut guard = self.inner.lock();
        let inner = guard.as_mut().ok_or(EngineError::Closed)?;
        inner.writer.flush()?;
        let file = inner.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        inner.index.clear();
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        if let Some(mut inner) = self.inner.lock().take() {
            inner.writer.flush()?;
        }
        Ok(())
    }
}

fn append(w: &mut BufWriter<File>, op: u8, key: &str, value: &[u8]) -> io::Result<()> {
    w.write_all(&[op])?;
    w.write_all(&(key.len() as u32).to_le_bytes())?;
    w.write_all(&(value.len() as u32).to_le_bytes())?;
    w.write_all(key.as_bytes())?;
    w.write_all(value)
}

/// Rebuild the index from the log. Returns the index and the byte length of
/// the valid record stream; a torn or unrecognized tail is excluded.
fn replay(file: &mut File) -> EngineResult<(BTreeMap<String, Vec<u8>>, u64)> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(&mut *file);
    let mut index = BTreeMap::new();
    let mut valid: u64 = 0;

    while let Some((op, key, value)) = read_record(&mut reader)? {
        let len = (HEADER_LEN + key.len() + value.len()) as u64;
        match op {
            OP_PUT => {
                index.insert(key, value);
            }
            OP_DELETE => {
                index.remove(&key);
            }
            _ => break,
        }
        valid += len;
    }
    Ok((index, valid))
}

fn read_record(r: &mut impl Read) -> EngineResult<Option<(u8, String, Vec<u8>)>> {
    let mut header = [0u8; HEADER_LEN];
    if !read_or_eof(r, &mut header)? {
        return Ok(None);
    }
    let op = header[0];
    let key_len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let value_len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]) as usize;

    let mut key = vec![0u8; key_len];
    if !read_or_eof(r, &mut key)? {
        return Ok(None);
    }
    let mut value = vec![0u8; value_len];
    if !read_or_eof(r, &mut value)? {
        return Ok(None);
    }
    Ok(Some((
        op,
        String::from_utf8_lossy(&key).into_owned(),
        value,
    )))
}

/// Fill `buf` completely, or report a clean/torn end of stream as `false`.
fn read_or_eof(r: &mut impl Read, buf: &mut [u8]) -> EngineResult<bool> {
    match r.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

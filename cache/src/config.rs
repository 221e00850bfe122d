//! Backend selection and construction.

use std::path::PathBuf;

use hoard_kv::{EngineError, LogEngine, MemoryEngine, RedbEngine, SledEngine};
use serde::Deserialize;
use tracing::debug;

use crate::cache::{Cache, HashLayout};
use crate::error::{Error, Result};
use crate::store::{BoxedStore, Store};

/// Which backend serves the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    #[default]
    Memory,
    TransactionalFile,
    OrderedFile,
    AppendLogFile,
    RemoteServer,
    EmbeddedMultitypeServer,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Memory => "memory",
            BackendType::TransactionalFile => "transactional-file",
            BackendType::OrderedFile => "ordered-file",
            BackendType::AppendLogFile => "append-log-file",
            BackendType::RemoteServer => "remote-server",
            BackendType::EmbeddedMultitypeServer => "embedded-multitype-server",
        }
    }
}

/// Backend configuration. Every field has a usable default, so an empty
/// config yields the in-process backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "type")]
    pub backend: BackendType,

    /// Remote endpoint for server backends.
    pub address: String,

    /// Remote server credential.
    pub password: String,

    /// Remote server database index.
    pub db: u32,

    /// Directory holding the data files of file backends.
    pub data_dir: String,
}

impl Config {
    /// Remote endpoint, defaulting to the local server port.
    pub fn address(&self) -> String {
        if self.address.is_empty() {
            "127.0.0.1:6379".to_string()
        } else {
            self.address.clone()
        }
    }

    /// Directory for file backends, derived from the executable name when
    /// unset.
    pub fn data_dir(&self) -> PathBuf {
        if !self.data_dir.is_empty() {
            return PathBuf::from(&self.data_dir);
        }
        let stem = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "hoard-cache".to_string());
        PathBuf::from(format!("{stem}-cache"))
    }
}

/// Construct the backend selected by the config.
///
/// The remote backends (a networked server, an embedded multi-type server)
/// are external collaborators: they satisfy [`Store`] natively and plug in
/// by implementing the trait, so asking this factory for them is an error.
pub fn open(config: &Config) -> Result<BoxedStore> {
    debug!(backend = config.backend.as_str(), "opening cache backend");
    match config.backend {
        BackendType::Memory => boxed(Cache::new(MemoryEngine::new(), HashLayout::Blob)),
        BackendType::TransactionalFile => {
            let path = file_path(config, "cache.redb")?;
            boxed(Cache::new(RedbEngine::open(path)?, HashLayout::Fielded))
        }
        BackendType::OrderedFile => {
            let path = file_path(config, "cache.sled")?;
            boxed(Cache::new(SledEngine::open(path)?, HashLayout::Fielded))
        }
        BackendType::AppendLogFile => {
            let path = file_path(config, "cache.log")?;
            boxed(Cache::new(LogEngine::open(path)?, HashLayout::Fielded))
        }
        BackendType::RemoteServer | BackendType::EmbeddedMultitypeServer => Err(
            Error::UnsupportedBackend(config.backend.as_str().to_string()),
        ),
    }
}

fn file_path(config: &Config, file: &str) -> Result<PathBuf> {
    let dir = config.data_dir();
    std::fs::create_dir_all(&dir).map_err(EngineError::Io)?;
    Ok(dir.join(file))
}

fn boxed<S: Store + 'static>(store: S) -> Result<BoxedStore> {
    Ok(Box::new(store))
}

//! Redis-shaped data model over interchangeable storage engines.
//!
//! One [`Store`] trait exposes strings, counters, hashes, sets, TTLs, and
//! bulk cleanup; which engine serves it is a runtime configuration choice.
//! The emulation is written once in [`Cache`], generically over the minimal
//! engine capability from `hoard-kv`, so all backends expose identical
//! observable semantics.
//!
//! Expiration is checked lazily on every read via the [`Item`] liveness
//! predicate, with a rate-limited opportunistic sweep reclaiming entries
//! that are never read again.
//!
//! ```no_run
//! use hoard_cache::{open, Config};
//!
//! let store = open(&Config::default()).unwrap();
//! store.set("greeting", "hello").unwrap();
//! assert_eq!(store.get("greeting").unwrap(), "hello");
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod item;
pub mod keys;
pub mod store;
pub mod sweep;

pub use cache::{Cache, HashLayout};
pub use config::{open, BackendType, Config};
pub use error::{Error, Result};
pub use item::Item;
pub use store::{BoxedStore, Store, Ttl};

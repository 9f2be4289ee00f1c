//! # ttlmap - A Concurrent Time-Expiring Key-Value Store
//!
//! ttlmap is an in-memory map where every entry lives for a bounded time.
//! Entries are evicted lazily when read after their deadline, flagged by a
//! background sweeper, and announced exactly once to registered expiration
//! listeners.
//!
//! ## Features
//!
//! - **Per-entry TTL**: a default time-to-live, overridable on every write
//! - **Sharded storage**: values and expiry records in independent `RwLock` shards
//! - **Exactly-once notification**: an atomic flag decides who announces an expiry
//! - **Background sweeper**: a Tokio task stopped on shutdown or drop
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            ExpiringCache                                │
//! │                                                                         │
//! │  ┌──────────────────────────────┐   ┌──────────────────────────────┐    │
//! │  │         ValueStore           │   │        EntryRegistry         │    │
//! │  │ ┌────────┐┌────────┐┌──────┐ │   │ ┌────────┐┌────────┐┌──────┐ │    │
//! │  │ │Shard 0 ││Shard 1 ││...N  │ │   │ │Shard 0 ││Shard 1 ││...N  │ │    │
//! │  │ └────────┘└────────┘└──────┘ │   │ └────────┘└────────┘└──────┘ │    │
//! │  └──────────────────────────────┘   └───────────────▲──────────────┘    │
//! │                                                     │                   │
//! │  ┌──────────────────────────────┐   ┌───────────────┴──────────────┐    │
//! │  │      ListenerRegistry        │<──│        ExpirySweeper         │    │
//! │  │  item_expired(&key) x N      │   │    (Background Tokio Task)   │    │
//! │  └──────────────────────────────┘   └──────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use ttlmap::{ExpiringCache, TimeUnit};
//!
//! #[tokio::main]
//! async fn main() -> ttlmap::Result<()> {
//!     let cache: ExpiringCache<String, u32> =
//!         ExpiringCache::with_default_ttl(5, TimeUnit::Seconds)?;
//!
//!     cache.add_listener(|key: &String| println!("{} expired", key))?;
//!
//!     cache.put("visits".to_string(), 1)?;
//!     cache.put_with_ttl("flash".to_string(), 2, Duration::from_millis(100))?;
//!
//!     tokio::time::sleep(Duration::from_secs(2)).await;
//!     assert_eq!(cache.get("visits")?, Some(1));
//!
//!     cache.shutdown()
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`cache`]: the [`ExpiringCache`] facade
//! - [`storage`]: value store, entry registry and the expiry sweeper
//! - [`listener`]: expiration listeners and their registry
//! - [`config`]: [`CacheConfig`] and [`TimeUnit`]
//! - [`commands`]: the interactive shell used by the `ttlmap` binary
//!
//! ## Expiry
//!
//! An entry expires once strictly more than its time-to-live has passed
//! since it was written (or last touched). Two things notice that:
//! 1. **Lazy**: a read of an expired entry returns the value one last time
//!    and removes it
//! 2. **Active**: the sweeper flags expired entries on every tick
//!
//! Whichever notices first flips the entry's flag and notifies listeners;
//! the other sees the flag already set and stays quiet.

pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod listener;
pub mod storage;

// Re-export commonly used types for convenience
pub use cache::{CacheStats, ExpiringCache};
pub use config::{CacheConfig, TimeUnit};
pub use error::{CacheError, Result};
pub use listener::{ExpirationListener, ListenerId};
pub use storage::ExpirySweeper;

/// Version of ttlmap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

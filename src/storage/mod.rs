//! Storage Module
//!
//! The building blocks behind [`ExpiringCache`](crate::ExpiringCache): a
//! sharded value store, a sharded registry of per-key expiry records, and the
//! background sweeper that flags expired records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ValueStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      EntryRegistry                          │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ flags, never removes
//!              ┌─────────────┴─────────────┐
//!              │      ExpirySweeper        │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: independent `RwLock`s reduce lock contention
//! - **Atomic Expiry Flag**: one winner per expiration, no double notification
//! - **Lazy Eviction**: expired values are removed by the read that serves them
//! - **Active Detection**: the sweeper flags and reports expirations on a timer

pub mod entry;
pub mod expiry;
pub mod registry;
pub mod store;

pub use entry::{ExpiryRecord, ExpiryState};
pub use expiry::{ExpirySweeper, SweepReport};
pub use registry::EntryRegistry;
pub use store::ValueStore;

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Determines which shard a key belongs to.
///
/// Every sharded structure in the crate uses this, so a key maps to the same
/// index in the store, the registry and the cache's key locks.
#[inline]
pub(crate) fn shard_index<Q: Hash + ?Sized>(key: &Q, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % shards
}

// Nothing panics while holding these locks (listener callbacks run unlocked),
// so a poisoned lock still guards consistent data.

#[inline]
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
pub(crate) fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

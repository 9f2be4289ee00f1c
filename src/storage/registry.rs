//! Entry Registry
//!
//! Per-key expiration metadata, kept beside (not inside) the value store.
//! The registry is sharded the same way as the store: each shard is an
//! independent `RwLock<HashMap>`, so the sweeper scanning one shard never
//! blocks writers on the others.
//!
//! Records are handed out as `Arc<ExpiryRecord>`. Checking a record only
//! needs a shard *read* lock because the expired flag is atomic; that is what
//! lets readers and the sweeper race on the same key without double-firing.

use super::entry::{ExpiryRecord, ExpiryState};
use super::{read_lock, shard_index, write_lock};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

type RecordShard<K> = RwLock<HashMap<K, Arc<ExpiryRecord>>>;

/// Sharded map from key to its [`ExpiryRecord`].
pub struct EntryRegistry<K> {
    shards: Box<[RecordShard<K>]>,
}

impl<K> std::fmt::Debug for EntryRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryRegistry")
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl<K> EntryRegistry<K>
where
    K: Hash + Eq + Clone,
{
    /// Creates an empty registry with `shards` shards.
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    #[inline]
    fn shard<Q>(&self, key: &Q) -> &RecordShard<K>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        &self.shards[shard_index(key, self.shards.len())]
    }

    /// (Re)starts the clock for `key` with the given ttl, replacing any
    /// earlier record whether it was live or expired.
    pub fn record(&self, key: K, ttl: Duration) -> Arc<ExpiryRecord> {
        let record = Arc::new(ExpiryRecord::new(ttl));
        write_lock(self.shard(&key)).insert(key, Arc::clone(&record));
        record
    }

    /// Returns the current record for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<ExpiryRecord>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        read_lock(self.shard(key)).get(key).cloned()
    }

    /// Checks `key` against `now`, flagging it if its ttl has elapsed.
    ///
    /// Returns `None` when the key has no record.
    pub fn check_expired<Q>(&self, key: &Q, now: Instant) -> Option<ExpiryState>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        read_lock(self.shard(key)).get(key).map(|record| record.check(now))
    }

    /// Drops the record for `key`.
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<ExpiryRecord>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        write_lock(self.shard(key)).remove(key)
    }

    /// Drops the record for `key`, handing back the owned key with it.
    pub fn remove_entry<Q>(&self, key: &Q) -> Option<(K, Arc<ExpiryRecord>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        write_lock(self.shard(key)).remove_entry(key)
    }

    /// Drops the record for `key` only if it is still `expected`.
    ///
    /// Used when a decision was made on a snapshot and a concurrent `record`
    /// may have replaced the entry in the meantime.
    pub fn remove_if_same<Q>(&self, key: &Q, expected: &Arc<ExpiryRecord>) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut records = write_lock(self.shard(key));
        match records.get(key) {
            Some(current) if Arc::ptr_eq(current, expected) => {
                records.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Returns true if `key` has a record.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        read_lock(self.shard(key)).contains_key(key)
    }

    /// Checks every record against `now` and returns the keys whose flag
    /// was flipped by this scan.
    ///
    /// Each shard is checked under its read lock, so a key removed
    /// concurrently is either seen (and was present when checked) or not seen
    /// at all. Keys that were already flagged are not returned again.
    pub fn sweep(&self, now: Instant) -> Vec<K> {
        let mut transitioned = Vec::new();
        for shard in self.shards.iter() {
            let records = read_lock(shard);
            for (key, record) in records.iter() {
                if record.check(now) == ExpiryState::Transitioned {
                    transitioned.push(key.clone());
                }
            }
        }
        transitioned
    }

    /// Returns flagged records whose ttl elapsed more than `grace` ago.
    pub fn reapable(&self, now: Instant, grace: Duration) -> Vec<(K, Arc<ExpiryRecord>)> {
        let mut candidates = Vec::new();
        for shard in self.shards.iter() {
            let records = read_lock(shard);
            for (key, record) in records.iter() {
                let overdue = now.saturating_duration_since(record.touched_at())
                    > record.ttl().saturating_add(grace);
                if record.is_flagged() && overdue {
                    candidates.push((key.clone(), Arc::clone(record)));
                }
            }
        }
        candidates
    }

    /// Drops every record.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            write_lock(shard).clear();
        }
    }

    /// Number of records across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| read_lock(shard).len()).sum()
    }

    /// Returns true if no key has a record.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| read_lock(shard).is_empty())
    }
}

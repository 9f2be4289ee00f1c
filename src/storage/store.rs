//! Value Store
//!
//! A thread-safe, sharded key → value map with no knowledge of expiration.
//! All eviction decisions are made by the cache facade using the entry
//! registry; this type only stores, returns and removes.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ValueStore                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards using the same hash as the registry,
//! so a key lives at the same shard index in both.

use super::{read_lock, shard_index, write_lock};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

type ValueShard<K, V> = RwLock<HashMap<K, V>>;

/// Sharded backing container for cached values.
pub struct ValueStore<K, V> {
    shards: Box<[ValueShard<K, V>]>,
}

impl<K, V> std::fmt::Debug for ValueStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStore")
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl<K, V> ValueStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates an empty store with `shards` shards.
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    /// Creates a store pre-populated with the contents of `map`.
    pub fn from_map(map: HashMap<K, V>, shards: usize) -> Self {
        let store = Self::new(shards);
        for (key, value) in map {
            store.insert(key, value);
        }
        store
    }

    #[inline]
    fn shard<Q>(&self, key: &Q) -> &ValueShard<K, V>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        &self.shards[shard_index(key, self.shards.len())]
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        write_lock(self.shard(&key)).insert(key, value)
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        read_lock(self.shard(key)).get(key).cloned()
    }

    /// Removes `key`, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        write_lock(self.shard(key)).remove(key)
    }

    /// Returns true if `key` is stored.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        read_lock(self.shard(key)).contains_key(key)
    }

    /// Returns true if any key maps to `value`.
    ///
    /// **Warning**: This scans every shard.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.shards
            .iter()
            .any(|shard| read_lock(shard).values().any(|v| v == value))
    }

    /// Removes everything.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            write_lock(shard).clear();
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| read_lock(shard).len()).sum()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| read_lock(shard).is_empty())
    }

    /// Snapshot of all keys.
    pub fn keys(&self) -> Vec<K> {
        let mut result = Vec::new();
        for shard in self.shards.iter() {
            result.extend(read_lock(shard).keys().cloned());
        }
        result
    }

    /// Snapshot of all values.
    pub fn values(&self) -> Vec<V> {
        let mut result = Vec::new();
        for shard in self.shards.iter() {
            result.extend(read_lock(shard).values().cloned());
        }
        result
    }

    /// Snapshot of all key-value pairs.
    pub fn entries(&self) -> Vec<(K, V)> {
        let mut result = Vec::new();
        for shard in self.shards.iter() {
            let data = read_lock(shard);
            result.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        result
    }
}

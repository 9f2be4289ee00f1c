//! Expiring Cache
//!
//! The public facade. [`ExpiringCache`] composes a [`ValueStore`], an
//! [`EntryRegistry`], a [`ListenerRegistry`] and an [`ExpirySweeper`] and
//! exposes map-like operations with lazy eviction on read.
//!
//! ## Read contract
//!
//! - A key without an expiry record reads as absent.
//! - A live entry is returned as-is; reading never refreshes its clock.
//! - An expired entry is returned **one last time** and removed in the same
//!   call (expire-after-serving). Every later read sees it as absent.
//!
//! ## Locking
//!
//! ```text
//!  put / get / remove / touch          sweeper
//!        │                               │
//!        ▼                               │
//!  key lock (striped Mutex)              │
//!        │                               │
//!        ├──> EntryRegistry shard <──────┘ (read lock, atomic flag)
//!        └──> ValueStore shard
//! ```
//!
//! Every operation that touches both the registry and the store for a key
//! holds that key's stripe lock, so the pair is updated atomically from the
//! caller's point of view. The sweeper's scan only takes registry read locks
//! and never waits on key locks. Listener callbacks always run after every
//! lock is released, so a listener may call back into the cache.

use crate::config::{CacheConfig, TimeUnit};
use crate::error::{CacheError, Result};
use crate::listener::{ExpirationListener, ListenerId, ListenerRegistry};
use crate::storage::expiry::Sweep;
use crate::storage::{
    mutex_lock, shard_index, EntryRegistry, ExpirySweeper, ExpiryState, SweepReport, ValueStore,
};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Operation counters, updated with relaxed atomics.
#[derive(Debug, Default)]
struct Counters {
    puts: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    removals: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    reaped: AtomicU64,
    listener_failures: AtomicU64,
    sweeps: AtomicU64,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Values currently held by the store (expired-but-unread included)
    pub entries: usize,
    /// Expiry records currently tracked
    pub tracked: usize,
    /// Registered listeners
    pub listeners: usize,
    /// Total writes (each key of a bulk write counts once)
    pub puts: u64,
    /// Total reads
    pub gets: u64,
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that returned nothing
    pub misses: u64,
    /// Explicit removals of a present key
    pub removals: u64,
    /// Expiration events (one per entry lifetime)
    pub expirations: u64,
    /// Expired entries removed by the read that served them
    pub evictions: u64,
    /// Expired entries removed by the reaper
    pub reaped: u64,
    /// Listener invocations that failed or panicked
    pub listener_failures: u64,
    /// Completed sweeps
    pub sweeps: u64,
}

impl CacheStats {
    /// Fraction of reads that returned a value, or 0.0 without reads.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// State shared between the facade and the sweeper task.
struct Shared<K, V> {
    store: ValueStore<K, V>,
    registry: EntryRegistry<K>,
    listeners: ListenerRegistry<K>,
    key_locks: Box<[Mutex<()>]>,
    reap_after: Option<Duration>,
    closed: AtomicBool,
    counters: Counters,
}

impl<K, V> Shared<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    #[inline]
    fn lock_key<Q>(&self, key: &Q) -> MutexGuard<'_, ()>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        mutex_lock(&self.key_locks[shard_index(key, self.key_locks.len())])
    }

    /// Tells every listener that `key` expired. Must be called unlocked.
    fn dispatch(&self, key: &K) -> usize {
        self.counters.expirations.fetch_add(1, Ordering::Relaxed);
        let delivery = self.listeners.notify(key);
        trace!(
            delivered = delivery.delivered,
            failed = delivery.failed,
            "Expiration dispatched"
        );
        if delivery.failed > 0 {
            self.counters
                .listener_failures
                .fetch_add(delivery.failed as u64, Ordering::Relaxed);
        }
        delivery.failed
    }

    fn write(&self, key: K, value: V, ttl: Duration) -> Option<V> {
        let _guard = self.lock_key(&key);
        self.registry.record(key.clone(), ttl);
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
        self.store.insert(key, value)
    }

    /// Removes records that stayed expired and unread past the grace period.
    fn reap(&self, now: Instant, grace: Duration) -> usize {
        let mut reaped = 0;
        for (key, record) in self.registry.reapable(now, grace) {
            let _guard = self.lock_key(&key);
            // A put may have replaced the record since the scan
            if self.registry.remove_if_same(&key, &record) {
                self.store.remove(&key);
                reaped += 1;
            }
        }
        if reaped > 0 {
            self.counters
                .reaped
                .fetch_add(reaped as u64, Ordering::Relaxed);
        }
        reaped
    }
}

impl<K, V> Sweep for Shared<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn sweep(&self, now: Instant) -> SweepReport {
        if self.closed.load(Ordering::Acquire) {
            return SweepReport::default();
        }

        let expired = self.registry.sweep(now);
        let mut report = SweepReport {
            expired: expired.len(),
            ..Default::default()
        };

        for key in &expired {
            report.listener_failures += self.dispatch(key);
        }

        if let Some(grace) = self.reap_after {
            report.reaped = self.reap(now, grace);
        }

        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
        report
    }
}

/// A concurrent map whose entries expire after a per-entry time-to-live.
///
/// # Thread Safety
///
/// All operations take `&self` and are safe to call from any number of
/// threads; share the cache with an `Arc`. Construction must happen inside a
/// tokio runtime because it spawns the background sweeper.
///
/// # Example
///
/// ```
/// use ttlmap::{CacheConfig, ExpiringCache, TimeUnit};
///
/// #[tokio::main]
/// async fn main() -> ttlmap::Result<()> {
///     let config = CacheConfig::with_default_ttl(10, TimeUnit::Seconds);
///     let cache: ExpiringCache<String, String> = ExpiringCache::new(config)?;
///
///     cache.add_listener(|key: &String| println!("{} expired", key))?;
///
///     cache.put("name".to_string(), "Ariz".to_string())?;
///     cache.put_for("otp".to_string(), "123456".to_string(), 30, TimeUnit::Seconds)?;
///
///     assert_eq!(cache.get("name")?, Some("Ariz".to_string()));
///     assert_eq!(cache.len()?, 2);
///
///     cache.shutdown()
/// }
/// ```
pub struct ExpiringCache<K, V> {
    shared: Arc<Shared<K, V>>,
    sweeper: ExpirySweeper,
    default_ttl: Duration,
}

impl<K, V> std::fmt::Debug for ExpiringCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("default_ttl", &self.default_ttl)
            .field("reap_after", &self.shared.reap_after)
            .field("shards", &self.shared.key_locks.len())
            .field("closed", &self.shared.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache and starts its sweeper.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidConfig`] for an invalid configuration,
    /// [`CacheError::NoRuntime`] outside a tokio runtime.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_store(HashMap::new(), config)
    }

    /// Creates a cache with the given default time-to-live and otherwise
    /// default settings.
    pub fn with_default_ttl(duration: u64, unit: TimeUnit) -> Result<Self> {
        Self::new(CacheConfig::with_default_ttl(duration, unit))
    }

    /// Creates a cache on top of an existing map.
    ///
    /// Every seeded key is recorded with the default time-to-live, starting
    /// now, so it expires like any other entry.
    pub fn with_store(initial: HashMap<K, V>, config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let default_ttl = config.default_ttl();
        let registry = EntryRegistry::new(config.shards);
        for key in initial.keys() {
            registry.record(key.clone(), default_ttl);
        }
        let seeded = initial.len();

        let shared = Arc::new(Shared {
            store: ValueStore::from_map(initial, config.shards),
            registry,
            listeners: ListenerRegistry::new(),
            key_locks: (0..config.shards).map(|_| Mutex::new(())).collect(),
            reap_after: config.reap_after,
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        });

        let sweeper = ExpirySweeper::start(Arc::clone(&shared), config.sweep_interval)?;

        debug!(
            default_ttl_ms = default_ttl.as_millis() as u64,
            shards = config.shards,
            seeded,
            "Expiring cache created"
        );

        Ok(Self {
            shared,
            sweeper,
            default_ttl,
        })
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    /// The time-to-live applied by [`put`](Self::put).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores `value` under `key` with the default time-to-live.
    ///
    /// Returns the value previously stored under `key`, whether or not that
    /// value had expired.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>> {
        self.put_with_ttl(key, value, self.default_ttl)
    }

    /// Stores `value` under `key`, expiring after `ttl`.
    ///
    /// Any earlier schedule for `key` is discarded: the clock restarts now
    /// with the new ttl. A zero ttl makes the entry eligible for expiry on
    /// the very next check.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<Option<V>> {
        self.ensure_open()?;
        Ok(self.shared.write(key, value, ttl))
    }

    /// Stores `value` under `key`, expiring after `amount` of `unit`.
    ///
    /// Zero and negative amounts mean "expire on the next check".
    pub fn put_for(&self, key: K, value: V, amount: i64, unit: TimeUnit) -> Result<Option<V>> {
        self.put_with_ttl(key, value, unit.to_duration(amount))
    }

    /// Stores every pair with the default time-to-live.
    pub fn put_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.put_all_with_ttl(entries, self.default_ttl)
    }

    /// Stores every pair, each expiring after `ttl`.
    ///
    /// Each key is recorded and written atomically; the batch as a whole is
    /// not, so a concurrent reader may see some keys before others.
    pub fn put_all_with_ttl<I>(&self, entries: I, ttl: Duration) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.ensure_open()?;
        let mut written = 0usize;
        for (key, value) in entries {
            self.shared.write(key, value, ttl);
            written += 1;
        }
        trace!(written, "Bulk write applied");
        Ok(())
    }

    /// Stores every pair, each expiring after `amount` of `unit`.
    pub fn put_all_for<I>(&self, entries: I, amount: i64, unit: TimeUnit) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.put_all_with_ttl(entries, unit.to_duration(amount))
    }

    /// Gets the value for `key`.
    ///
    /// Returns `None` if `key` has no expiry record. If the entry has
    /// expired, its value is still returned by this call and the entry is
    /// removed, so the next call returns `None`. Reading never extends the
    /// entry's lifetime.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_open()?;
        let shared = &*self.shared;
        shared.counters.gets.fetch_add(1, Ordering::Relaxed);

        let guard = shared.lock_key(key);

        let state = match shared.registry.check_expired(key, Instant::now()) {
            Some(state) => state,
            None => {
                shared.counters.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        let value = shared.store.get(key);
        let counter = if value.is_some() {
            &shared.counters.hits
        } else {
            &shared.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if !state.is_expired() {
            return Ok(value);
        }

        // Expire-after-serving: hand out the value one last time
        let removed = shared.registry.remove_entry(key);
        shared.store.remove(key);
        shared.counters.evictions.fetch_add(1, Ordering::Relaxed);
        drop(guard);

        if state == ExpiryState::Transitioned {
            if let Some((owned_key, _)) = removed {
                shared.dispatch(&owned_key);
            }
        }

        Ok(value)
    }

    /// Removes `key`, returning its value. Removal is not an expiration and
    /// notifies nobody.
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_open()?;
        let shared = &*self.shared;
        let _guard = shared.lock_key(key);

        shared.registry.remove(key);
        let previous = shared.store.remove(key);
        if previous.is_some() {
            shared.counters.removals.fetch_add(1, Ordering::Relaxed);
        }
        Ok(previous)
    }

    /// Restarts the clock of a live entry, keeping its time-to-live.
    ///
    /// Returns false if `key` is absent or already flagged as expired.
    pub fn touch<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_open()?;
        let _guard = self.shared.lock_key(key);
        Ok(self
            .shared
            .registry
            .get(key)
            .map(|record| record.touch(Instant::now()))
            .unwrap_or(false))
    }

    /// Remaining lifetime of `key` (zero once elapsed), or `None` if absent.
    pub fn time_to_live<Q>(&self, key: &Q) -> Result<Option<Duration>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_open()?;
        Ok(self
            .shared
            .registry
            .get(key)
            .map(|record| record.remaining(Instant::now())))
    }

    /// Removes every entry. Clearing is not an expiration and notifies
    /// nobody.
    pub fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        let shared = &*self.shared;

        // Stripes are always taken in index order
        let _guards: Vec<MutexGuard<'_, ()>> = shared.key_locks.iter().map(mutex_lock).collect();
        shared.registry.clear();
        shared.store.clear();

        debug!("Expiring cache cleared");
        Ok(())
    }

    /// Number of stored values, including expired entries not yet read.
    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.shared.store.len())
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.shared.store.is_empty())
    }

    /// Returns true if `key` is stored, expired-but-unread included.
    pub fn contains_key<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.ensure_open()?;
        Ok(self.shared.store.contains_key(key))
    }

    /// Returns true if any key maps to `value`.
    pub fn contains_value(&self, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.ensure_open()?;
        Ok(self.shared.store.contains_value(value))
    }

    /// Snapshot of the stored keys.
    pub fn keys(&self) -> Result<Vec<K>> {
        self.ensure_open()?;
        Ok(self.shared.store.keys())
    }

    /// Snapshot of the stored values.
    pub fn values(&self) -> Result<Vec<V>> {
        self.ensure_open()?;
        Ok(self.shared.store.values())
    }

    /// Snapshot of the stored key-value pairs.
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        self.ensure_open()?;
        Ok(self.shared.store.entries())
    }

    /// Registers a listener notified once for every expiring entry.
    pub fn add_listener<L>(&self, listener: L) -> Result<ListenerId>
    where
        L: ExpirationListener<K> + 'static,
    {
        self.ensure_open()?;
        Ok(self.shared.listeners.add(listener))
    }

    /// Unregisters a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.shared.listeners.remove(id))
    }

    /// Stops the sweeper, releases every listener and closes the cache.
    /// Every later operation, including a second shutdown, fails with
    /// [`CacheError::Closed`].
    ///
    /// Operations already in progress complete normally.
    pub fn shutdown(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::Closed);
        }
        self.sweeper.stop();
        self.shared.listeners.clear();
        info!(
            entries = self.shared.store.len(),
            "Expiring cache shut down"
        );
        Ok(())
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Returns a snapshot of the cache statistics. Works after shutdown.
    pub fn stats(&self) -> CacheStats {
        let shared = &*self.shared;
        let c = &shared.counters;
        CacheStats {
            entries: shared.store.len(),
            tracked: shared.registry.len(),
            listeners: shared.listeners.len(),
            puts: c.puts.load(Ordering::Relaxed),
            gets: c.gets.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            removals: c.removals.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            reaped: c.reaped.load(Ordering::Relaxed),
            listener_failures: c.listener_failures.load(Ordering::Relaxed),
            sweeps: c.sweeps.load(Ordering::Relaxed),
        }
    }
}

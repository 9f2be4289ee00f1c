//! Expiration Listeners
//!
//! Observers registered against a cache instance (not against single keys).
//! Every registered listener is told about every key expiration, exactly once
//! per expiration, for as long as it stays registered.
//!
//! ## Failure isolation
//!
//! A listener that returns an error or panics is logged and counted, and the
//! remaining listeners are still notified. Nothing a listener does can stop
//! the sweeper or fail the read that happened to deliver the notification.
//!
//! ## Example
//!
//! ```
//! use ttlmap::listener::ListenerRegistry;
//!
//! let registry: ListenerRegistry<String> = ListenerRegistry::new();
//! let id = registry.add(|key: &String| println!("{} expired", key));
//!
//! registry.notify(&"session".to_string());
//! assert!(registry.remove(id));
//! ```

use crate::storage::{read_lock, write_lock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{error, trace};

/// Receives expiration events.
///
/// Closures `Fn(&K)` implement this automatically. Implement it by hand when
/// the callback can fail.
pub trait ExpirationListener<K>: Send + Sync {
    /// Called once when `key` is first observed as expired.
    fn item_expired(&self, key: &K) -> anyhow::Result<()>;
}

impl<K, F> ExpirationListener<K> for F
where
    F: Fn(&K) + Send + Sync,
{
    fn item_expired(&self, key: &K) -> anyhow::Result<()> {
        self(key);
        Ok(())
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Result of fanning one event out to all listeners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

type SharedListener<K> = Arc<dyn ExpirationListener<K>>;

/// Concurrency-safe set of listeners.
///
/// Notification works on a snapshot taken under a short read lock, so
/// listeners may register or unregister (even from inside a callback) while
/// a fan-out is in progress. A listener added mid-fan-out may or may not see
/// the event being delivered.
pub struct ListenerRegistry<K> {
    listeners: RwLock<HashMap<ListenerId, SharedListener<K>>>,
    next_id: AtomicU64,
}

impl<K> fmt::Debug for ListenerRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<K> Default for ListenerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> ListenerRegistry<K> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener and returns its id.
    pub fn add<L>(&self, listener: L) -> ListenerId
    where
        L: ExpirationListener<K> + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        write_lock(&self.listeners).insert(id, Arc::new(listener));
        trace!(listener = %id, "Expiration listener registered");
        id
    }

    /// Unregisters a listener. Returns false if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        write_lock(&self.listeners).remove(&id).is_some()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        read_lock(&self.listeners).len()
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        read_lock(&self.listeners).is_empty()
    }

    /// Drops every listener.
    pub fn clear(&self) {
        write_lock(&self.listeners).clear();
    }

    /// Delivers `key` to every registered listener.
    pub fn notify(&self, key: &K) -> Delivery {
        let snapshot: Vec<(ListenerId, SharedListener<K>)> = read_lock(&self.listeners)
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        let mut delivery = Delivery::default();
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.item_expired(key))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(err)) => {
                    delivery.failed += 1;
                    error!(listener = %id, error = %err, "Expiration listener failed");
                }
                Err(payload) => {
                    delivery.failed += 1;
                    error!(
                        listener = %id,
                        panic = panic_message(payload.as_ref()),
                        "Expiration listener panicked"
                    );
                }
            }
        }
        delivery
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

//! Time-boxed result cache with per-key in-flight markers.
//!
//! This crate provides [`TtlCache`], the shared store the device framework
//! uses for two things:
//!
//! - **Hardware handle memoization**: an open bus/channel/session is cached
//!   indefinitely under a key derived from `(hardware type, address)`, so
//!   several logical devices on one physical chip share a single handle.
//! - **Measurement results**: a bundle produced by one physical read is
//!   cached for a short window under the same key derivation, so concurrent
//!   pollers reuse it instead of hammering the bus.
//!
//! # In-flight markers (single-flight)
//!
//! Each key additionally carries a *running* flag forming a single-flight
//! gate: a poller that wins [`TtlCache::set_running`] performs the physical
//! measurement while losers skip it and pick up the cached result on their
//! next cycle. `set_running` is an atomic test-and-set, returning whether
//! the flag was newly acquired, so at most one caller can win the gate per
//! key. A split "check, then set" protocol would admit a window where two
//! pollers both start measuring; the mutex that already guards the map
//! makes the strict gate free.
//!
//! # Concurrency
//!
//! [`TtlCache`] is cheaply cloneable; clones share the same store. All
//! operations take `&self` and are safe to call from any number of threads
//! or tasks.
//!
//! # Examples
//!
//! ```
//! use vivarium_cache::{CacheKey, Ttl, TtlCache};
//!
//! let cache: TtlCache<u32> = TtlCache::new();
//! let key = CacheKey::derive(&["sht2x", "0x40"]);
//!
//! cache.set(key.clone(), 42, Ttl::Forever);
//! assert_eq!(cache.get(&key), Some(42));
//!
//! assert!(cache.set_running(&key));
//! assert!(!cache.set_running(&key)); // already held
//! cache.clear_running(&key);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Content-derived cache key.
///
/// Keys are a pure function of their parts: deriving twice from the same
/// parts yields the same key. Hardware-handle keys and measurement keys for
/// one device use the same `(hardware, address)` parts but a distinct
/// leading tag, keeping the two key spaces disjoint while guaranteeing that
/// one physical address has exactly one polling state, no matter how many
/// logical devices share it.
///
/// # Examples
///
/// ```
/// use vivarium_cache::CacheKey;
///
/// let a = CacheKey::derive(&["analog", "0,1"]);
/// let b = CacheKey::derive(&["analog", "0,1"]);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Uuid);

impl CacheKey {
    /// Derive a key from identity parts.
    #[must_use]
    pub fn derive(parts: &[&str]) -> Self {
        let joined = parts.join(":");
        CacheKey(Uuid::new_v5(&Uuid::NAMESPACE_OID, joined.as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// How long a cached value stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Never expires.
    Forever,

    /// Expires after the given duration. `Duration::ZERO` expires
    /// immediately: the value is never observable through [`TtlCache::get`].
    For(Duration),
}

/// A single cache entry with its optional expiry deadline.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<CacheKey, Entry<V>>,
    running: HashSet<CacheKey>,
}

/// Shared time-boxed key/value store with per-key running flags.
///
/// See the [crate documentation](crate) for the role this store plays in the
/// device framework.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V> {
    /// Create a new, empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                running: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        // A poisoned lock means another poller panicked mid-operation; the
        // map itself is still structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove the value stored for `key`, if any.
    pub fn clear(&self, key: &CacheKey) {
        self.lock().entries.remove(key);
    }

    /// Check whether the running flag for `key` is currently held.
    #[must_use]
    pub fn is_running(&self, key: &CacheKey) -> bool {
        self.lock().running.contains(key)
    }

    /// Try to acquire the running flag for `key`.
    ///
    /// Returns `true` if the flag was newly acquired, `false` if another
    /// caller already holds it. The winner must call
    /// [`clear_running`](Self::clear_running) when done, on every exit path.
    #[must_use]
    pub fn set_running(&self, key: &CacheKey) -> bool {
        self.lock().running.insert(key.clone())
    }

    /// Release the running flag for `key`.
    pub fn clear_running(&self, key: &CacheKey) {
        self.lock().running.remove(key);
    }

    /// Number of live (stored, possibly expired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Get the value stored for `key`.
    ///
    /// Expired entries read as absent and are evicted lazily.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return None,
        };

        if expired {
            inner.entries.remove(key);
            return None;
        }

        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` for `key` with the given time-to-live.
    ///
    /// Overwrites any previous value, including its expiry.
    pub fn set(&self, key: CacheKey, value: V, ttl: Ttl) {
        let expires_at = match ttl {
            Ttl::Forever => None,
            Ttl::For(duration) => Some(Instant::now() + duration),
        };

        self.lock().entries.insert(key, Entry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn key_derivation_is_deterministic() {
        let a = CacheKey::derive(&["hw", "sht2x", "0x40"]);
        let b = CacheKey::derive(&["hw", "sht2x", "0x40"]);
        assert_eq!(a, b);
    }

    #[test]
    fn tagged_key_spaces_are_disjoint() {
        // Handle keys and measurement keys share parts but not the tag.
        let handle = CacheKey::derive(&["hw", "sht2x", "0x40"]);
        let reading = CacheKey::derive(&["sht2x", "0x40"]);
        assert_ne!(handle, reading);
    }

    #[test]
    fn forever_entries_round_trip() {
        let cache: TtlCache<String> = TtlCache::new();
        let key = CacheKey::derive(&["a"]);

        cache.set(key.clone(), "value".to_string(), Ttl::Forever);
        assert_eq!(cache.get(&key), Some("value".to_string()));
        assert_eq!(cache.get(&key), Some("value".to_string()));
    }

    #[test]
    fn zero_ttl_reads_absent_immediately() {
        let cache: TtlCache<u32> = TtlCache::new();
        let key = CacheKey::derive(&["a"]);

        cache.set(key.clone(), 1, Ttl::For(Duration::ZERO));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn entries_expire_after_their_ttl() {
        let cache: TtlCache<u32> = TtlCache::new();
        let key = CacheKey::derive(&["a"]);

        cache.set(key.clone(), 7, Ttl::For(Duration::from_millis(20)));
        assert_eq!(cache.get(&key), Some(7));

        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&key), None);
        // Lazy eviction removed the entry.
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_removes_entry() {
        let cache: TtlCache<u32> = TtlCache::new();
        let key = CacheKey::derive(&["a"]);

        cache.set(key.clone(), 1, Ttl::Forever);
        cache.clear(&key);
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn running_flag_is_a_test_and_set() {
        // Acquisition is atomic: a separate is_running check followed by a
        // blind set would let two pollers both pass before either set the
        // flag.
        let cache: TtlCache<u32> = TtlCache::new();
        let key = CacheKey::derive(&["a"]);

        assert!(!cache.is_running(&key));
        assert!(cache.set_running(&key));
        assert!(cache.is_running(&key));
        assert!(!cache.set_running(&key));

        cache.clear_running(&key);
        assert!(!cache.is_running(&key));
        assert!(cache.set_running(&key));
    }

    #[test]
    fn running_flag_has_one_winner_under_contention() {
        let cache: TtlCache<u32> = TtlCache::new();
        let key = CacheKey::derive(&["contended"]);

        let winners: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = cache.clone();
                    let key = key.clone();
                    scope.spawn(move || usize::from(cache.set_running(&key)))
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(winners, 1);
    }

    #[test]
    fn clones_share_the_store() {
        let cache: TtlCache<u32> = TtlCache::new();
        let clone = cache.clone();
        let key = CacheKey::derive(&["shared"]);

        cache.set(key.clone(), 9, Ttl::Forever);
        assert_eq!(clone.get(&key), Some(9));

        assert!(clone.set_running(&key));
        assert!(cache.is_running(&key));
    }
}

//! # Cache Primitives Module
//!
//! ## Purpose
//! Time-boxed in-process caches shared by the corpus loader and the search
//! orchestrator. Entries are immutable once published; writers replace whole
//! entries rather than mutating in place, so concurrent readers never observe
//! partial state.
//!
//! ## Input/Output Specification
//! - **Input**: Values to cache, a TTL, and an injected clock
//! - **Output**: `Arc`-shared snapshots while fresh, `None` once stale
//! - **Eviction**: Purely time-based for single cells; lazy oldest-expired
//!   sweep for keyed maps once a capacity bound is exceeded
//!
//! ## Key Features
//! - Injected clock for deterministic testing
//! - Whole-entry replacement, no fine-grained locking
//! - Lazy capacity-triggered sweep, no background tasks

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current instant. Production code uses [`SystemClock`];
/// tests inject a manually advanced clock so TTL expiry is deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`]
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Single-value TTL cache cell
pub struct TtlCell<T> {
    slot: RwLock<Option<Entry<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

struct Entry<T> {
    value: Arc<T>,
    created_at: Instant,
}

impl<T> TtlCell<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            clock,
        }
    }

    /// Return the cached value if present and within TTL
    pub fn get(&self) -> Option<Arc<T>> {
        let slot = self.slot.read();
        let entry = slot.as_ref()?;
        if self.clock.now().saturating_duration_since(entry.created_at) < self.ttl {
            Some(Arc::clone(&entry.value))
        } else {
            None
        }
    }

    /// Publish a fresh value, replacing any prior entry
    pub fn put(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.slot.write() = Some(Entry {
            value: Arc::clone(&value),
            created_at: self.clock.now(),
        });
        value
    }
}

/// Keyed TTL cache with a capacity-triggered lazy sweep
pub struct TtlMap<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash + Clone, V> TtlMap<K, V> {
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
            clock,
        }
    }

    /// Return the cached value for `key` if present and within TTL
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if self.clock.now().saturating_duration_since(entry.created_at) < self.ttl {
            Some(Arc::clone(&entry.value))
        } else {
            None
        }
    }

    /// Insert a fresh entry. When the map has grown past its capacity bound,
    /// expired entries are swept before the insert; the sweep is lazy and
    /// only ever drops entries older than the TTL.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let now = self.clock.now();
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, e| now.saturating_duration_since(e.created_at) < ttl);
        }
        entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                created_at: now,
            },
        );
        value
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Manually advanced clock for deterministic TTL tests
#[cfg(test)]
pub struct ManualClock {
    start: Instant,
    offset: parking_lot::Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: parking_lot::Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_hit_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cell: TtlCell<Vec<u32>> = TtlCell::new(Duration::from_secs(60), clock.clone());

        assert!(cell.get().is_none());
        let published = cell.put(vec![1, 2, 3]);
        let hit = cell.get().expect("fresh entry");
        // A cache hit returns the same in-memory object, not a re-read copy.
        assert!(Arc::ptr_eq(&published, &hit));
    }

    #[test]
    fn test_cell_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cell: TtlCell<u32> = TtlCell::new(Duration::from_secs(60), clock.clone());

        cell.put(7);
        clock.advance(Duration::from_secs(59));
        assert!(cell.get().is_some());
        clock.advance(Duration::from_secs(2));
        assert!(cell.get().is_none());
    }

    #[test]
    fn test_map_expiry_and_replacement() {
        let clock = Arc::new(ManualClock::new());
        let map: TtlMap<String, u32> = TtlMap::new(Duration::from_secs(30), 10, clock.clone());

        map.insert("a".to_string(), 1);
        clock.advance(Duration::from_secs(31));
        assert!(map.get(&"a".to_string()).is_none());

        // A new query produces a new entry rather than updating the old one.
        let second = map.insert("a".to_string(), 2);
        assert_eq!(*map.get(&"a".to_string()).unwrap(), *second);
    }

    #[test]
    fn test_map_capacity_sweep_drops_only_expired() {
        let clock = Arc::new(ManualClock::new());
        let map: TtlMap<u32, u32> = TtlMap::new(Duration::from_secs(30), 3, clock.clone());

        map.insert(1, 1);
        map.insert(2, 2);
        clock.advance(Duration::from_secs(31));
        map.insert(3, 3);
        // At capacity: next insert sweeps the two expired entries, keeps the
        // fresh one.
        map.insert(4, 4);
        assert!(map.get(&1).is_none());
        assert!(map.get(&2).is_none());
        assert!(map.get(&3).is_some());
        assert!(map.get(&4).is_some());
        assert_eq!(map.len(), 2);
    }
}

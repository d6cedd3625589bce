//! Process-local TTL cache.
//!
//! Wraps planner person-by-email lookups in a 300s TTL cache that tolerates
//! concurrent reads with last-write-wins semantics. A plain
//! `Mutex<HashMap>` is sufficient: entries are derived from the same
//! upstream record regardless of which request populates them, so a lost
//! write from a race is harmless.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A TTL-bounded cache keyed by `K`, storing clones of `V`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Default 300s TTL.
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(300))
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A process-wide, write-once-ish cache for data that rarely changes
/// within a run, such as the planner's role list. Populated lazily on
/// first read.
pub struct ProcessCache<V> {
    value: Mutex<Option<V>>,
}

impl<V: Clone> ProcessCache<V> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Option<V> {
        self.value.lock().expect("cache mutex poisoned").clone()
    }

    pub fn set(&self, value: V) {
        *self.value.lock().expect("cache mutex poisoned") = Some(value);
    }
}

impl<V: Clone> Default for ProcessCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl() {
        let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_millis(10));
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn process_cache_populates_once() {
        let cache: ProcessCache<Vec<String>> = ProcessCache::new();
        assert!(cache.get().is_none());
        cache.set(vec!["engineer".to_string()]);
        assert_eq!(cache.get(), Some(vec!["engineer".to_string()]));
    }
}

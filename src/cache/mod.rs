//! Bounded in-process cache with per-entry expiry

use serde::Serialize;
use std::{
    collections::HashMap,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Counters reported by the admin endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Map whose entries go stale after `ttl`.
///
/// When full, expired entries are dropped first, then the oldest one.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    inner: Arc<RwLock<Inner<K, V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            })),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.write().await;
        let fresh = inner
            .entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value.clone());

        match fresh {
            Some(value) => {
                inner.hits += 1;
                Some(value)
            }
            None => {
                if inner.entries.remove(key).is_some() {
                    inner.evictions += 1;
                }
                inner.misses += 1;
                None
            }
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.write().await;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let ttl = self.ttl;
            let before = inner.entries.len();
            inner.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
            let expired = (before - inner.entries.len()) as u64;
            inner.evictions += expired;

            if inner.entries.len() >= self.capacity {
                let oldest = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    inner.entries.remove(&oldest);
                    inner.evictions += 1;
                }
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop everything; returns how many entries were removed.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let removed = inner.entries.len();
        inner.entries.clear();
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            entries: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

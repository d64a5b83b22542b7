//! Bounded-capacity, LRU-evicting, TTL-expiring local key/value store.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use ringcache_core::{CacheValue, Entry};

use crate::config::{TTL_SWEEP_INITIAL_DELAY_MS, TTL_SWEEP_PERIOD_MS};
use crate::scheduler::PeriodicTask;
use crate::service::ManagedService;

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_millis() as u64
}

/// Point-in-time counters exposed by `/admin/stats`.
#[derive(Debug, Default)]
pub struct StoreCounters {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub deletes: u64,
}

struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> StoreCounters {
        StoreCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

/// Bounded LRU map of key -> `Entry`, with monotonic hit/miss/put/delete
/// counters and a background TTL sweep.
///
/// `get`/`put` both promote recency via `lru::LruCache`, which also performs
/// the capacity eviction itself: `put` past capacity silently drops the
/// least-recently-used entry without touching any counter.
pub struct LocalStore {
    map: Mutex<LruCache<String, Entry>>,
    counters: Counters,
    sweep: Mutex<Option<PeriodicTask>>,
}

impl LocalStore {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or_else(|| {
            tracing::warn!(
                configured = max_entries,
                "max_entries misconfigured, using default capacity"
            );
            NonZeroUsize::new(crate::config::DEFAULT_MAX_ENTRIES).expect("default is non-zero")
        });
        Self {
            map: Mutex::new(LruCache::new(cap)),
            counters: Counters::new(),
            sweep: Mutex::new(None),
        }
    }

    pub fn put(&self, key: String, value: CacheValue, ttl_ms: u64) {
        let entry = Entry::new(value, ttl_ms, now_ms());
        let inserted_key = key.clone();
        let mut map = self.map.lock();
        if let Some((evicted_key, _)) = map.push(key, entry) {
            if evicted_key != inserted_key {
                tracing::debug!(key = evicted_key, "evicted least-recently-used entry");
            }
        }
        drop(map);
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let now = now_ms();
        let mut map = self.map.lock();

        let expired = matches!(map.peek(key), Some(entry) if entry.is_expired(now));
        if expired {
            map.pop(key);
            drop(map);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let value = map.get(key).map(|entry| entry.value.clone());
        drop(map);
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Removes `key` if present; unconditionally increments `deletes`,
    /// including when `key` was never present.
    pub fn delete(&self, key: &str) {
        self.map.lock().pop(key);
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of non-expired entries. Expired entries not yet swept are
    /// still physically present but excluded from the count.
    #[must_use]
    pub fn size(&self) -> usize {
        let now = now_ms();
        self.map.lock().iter().filter(|(_, e)| !e.is_expired(now)).count()
    }

    /// Consistent snapshot of non-expired `(key, value)` pairs. Any expired
    /// entries observed during the scan are removed before returning.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Map<String, CacheValue> {
        let now = now_ms();
        let mut map = self.map.lock();

        let expired_keys: Vec<String> = map
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired_keys {
            map.pop(key);
        }

        map.iter().map(|(k, e)| (k.clone(), e.value.clone())).collect()
    }

    #[must_use]
    pub fn counters(&self) -> StoreCounters {
        self.counters.snapshot()
    }

    /// Estimated heap cost of all locally stored entries, in bytes.
    #[must_use]
    pub fn memory_usage_bytes(&self) -> u64 {
        self.map
            .lock()
            .iter()
            .map(|(k, e)| k.len() as u64 + estimate_value_bytes(&e.value))
            .sum()
    }
}

fn estimate_value_bytes(value: &CacheValue) -> u64 {
    serde_json::to_vec(value).map(|bytes| bytes.len() as u64).unwrap_or(0)
}

/// Best-effort process-wide resident memory, read from `/proc/self/statm`
/// on Linux. Returns 0 where that file isn't available.
#[must_use]
pub fn total_process_memory_bytes() -> u64 {
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|contents| {
            let pages: u64 = contents.split_whitespace().next()?.parse().ok()?;
            Some(pages * page_size_bytes())
        })
        .unwrap_or(0)
}

#[cfg(target_os = "linux")]
fn page_size_bytes() -> u64 {
    4096
}

#[cfg(not(target_os = "linux"))]
fn page_size_bytes() -> u64 {
    0
}

#[async_trait]
impl ManagedService for LocalStore {
    fn name(&self) -> &'static str {
        "local_store"
    }

    async fn init(&self) -> anyhow::Result<()> {
        // The TTL sweeper is started separately via `start_sweeper`, which
        // needs `Arc<Self>` rather than `&self`; see below.
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        if let Some(task) = self.sweep.lock().take() {
            task.cancel();
        }
        Ok(())
    }
}

impl LocalStore {
    /// Starts the TTL sweeper. Split out from `ManagedService::init` because
    /// the sweep closure needs `Arc<Self>`, not `&self`.
    pub fn start_sweeper(self: &std::sync::Arc<Self>) {
        let store = std::sync::Arc::clone(self);
        let task = PeriodicTask::spawn(
            Duration::from_millis(TTL_SWEEP_INITIAL_DELAY_MS),
            Duration::from_millis(TTL_SWEEP_PERIOD_MS),
            move || {
                let store = store.clone();
                async move {
                    let removed = store.sweep_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "ttl sweep removed expired entries");
                    }
                }
            },
        );
        *self.sweep.lock() = Some(task);
    }

    fn sweep_expired(&self) -> usize {
        let now = now_ms();
        let mut map = self.map.lock();
        let expired_keys: Vec<String> = map
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired_keys {
            map.pop(key);
        }
        expired_keys.len()
    }
}

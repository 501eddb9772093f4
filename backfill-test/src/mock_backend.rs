use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backfill_backend::{Backend, BackendError, BackendResult, format::FormatExt};
use backfill_core::{BackendLabel, CacheEntry, CacheKey, Raw};
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct BackendCounters {
    pub read_count: AtomicUsize,
    pub read_hit_count: AtomicUsize,
    pub read_miss_count: AtomicUsize,
    pub write_count: AtomicUsize,
}

impl BackendCounters {
    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn read_hit_count(&self) -> usize {
        self.read_hit_count.load(Ordering::SeqCst)
    }

    pub fn read_miss_count(&self) -> usize {
        self.read_miss_count.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.read_count.store(0, Ordering::SeqCst);
        self.read_hit_count.store(0, Ordering::SeqCst);
        self.read_miss_count.store(0, Ordering::SeqCst);
        self.write_count.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct Stored {
    entry: CacheEntry<Raw>,
    ceiling: Option<Duration>,
}

/// In-memory store keyed by [`CacheKey`].
///
/// Never evicts: an entry stays until overwritten, whatever its ceiling.
/// Clones share the same map and counters.
#[derive(Clone, Debug)]
pub struct MockBackend {
    cache: Arc<DashMap<CacheKey, Stored>>,
    pub counters: Arc<BackendCounters>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            counters: Arc::new(BackendCounters::default()),
        }
    }

    pub fn read_count(&self) -> usize {
        self.counters.read_count()
    }

    pub fn read_hit_count(&self) -> usize {
        self.counters.read_hit_count()
    }

    pub fn read_miss_count(&self) -> usize {
        self.counters.read_miss_count()
    }

    pub fn write_count(&self) -> usize {
        self.counters.write_count()
    }

    pub fn reset_counters(&self) {
        self.counters.reset();
    }

    pub fn cache_entry_count(&self) -> usize {
        self.cache.len()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Stored entry with its payload still encoded.
    pub fn raw_entry(&self, key: &CacheKey) -> Option<CacheEntry<Raw>> {
        self.cache.get(key).map(|stored| stored.entry.clone())
    }

    /// Ceiling passed with the last write under `key`.
    pub fn ceiling(&self, key: &CacheKey) -> Option<Duration> {
        self.cache.get(key).and_then(|stored| stored.ceiling)
    }

    /// Seed an entry without touching the counters.
    pub fn seed<T: Serialize>(&self, key: &CacheKey, entry: CacheEntry<T>) {
        let payload = self
            .value_format()
            .serialize(entry.payload())
            .expect("seed payload must serialize");
        let entry = CacheEntry::new(payload, entry.expires_at(), entry.evict_at());
        self.cache.insert(
            key.clone(),
            Stored {
                entry,
                ceiling: None,
            },
        );
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        self.counters.read_count.fetch_add(1, Ordering::SeqCst);
        let result = self.cache.get(key).map(|stored| stored.entry.clone());
        if result.is_some() {
            self.counters.read_hit_count.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.read_miss_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(result)
    }

    async fn write(
        &self,
        key: &CacheKey,
        entry: CacheEntry<Raw>,
        ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        self.counters.write_count.fetch_add(1, Ordering::SeqCst);
        self.cache.insert(key.clone(), Stored { entry, ceiling });
        Ok(())
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("mock")
    }
}

/// Backend that always returns errors.
///
/// Counts attempts so tests can check a failing store was still consulted.
#[derive(Clone, Debug, Default)]
pub struct ErrorBackend {
    pub counters: Arc<BackendCounters>,
}

impl ErrorBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn error() -> BackendError {
        BackendError::InternalError(Box::new(std::io::Error::other("simulated error")))
    }
}

#[async_trait]
impl Backend for ErrorBackend {
    async fn read(&self, _key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        self.counters.read_count.fetch_add(1, Ordering::SeqCst);
        Err(Self::error())
    }

    async fn write(
        &self,
        _key: &CacheKey,
        _entry: CacheEntry<Raw>,
        _ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        self.counters.write_count.fetch_add(1, Ordering::SeqCst);
        Err(Self::error())
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("error")
    }
}

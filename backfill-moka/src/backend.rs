use std::time::Duration;

use async_trait::async_trait;
use backfill_backend::format::{Format, JsonFormat};
use backfill_backend::{Backend, BackendResult, CacheKeyFormat};
use backfill_core::{BackendLabel, CacheEntry, CacheKey, Raw, deadline};
use chrono::Utc;
use moka::future::Cache;

use crate::builder::{MokaBackendBuilder, NoCapacity};
use crate::metrics;

/// In-memory store powered by Moka.
///
/// Each entry expires from Moka at its retention deadline
/// ([`CacheEntry::evict_at`], or the write ceiling when the entry has none).
/// Entries written without either only leave through capacity eviction.
///
/// Data is neither persisted nor shared across processes.
///
/// # Examples
///
/// ```
/// use backfill_moka::MokaBackend;
/// use backfill_backend::format::BincodeFormat;
///
/// let backend = MokaBackend::builder()
///     .max_entries(10_000)
///     .value_format(BincodeFormat)
///     .build();
/// ```
#[derive(Clone)]
pub struct MokaBackend<S = JsonFormat>
where
    S: Format,
{
    pub(crate) cache: Cache<CacheKey, CacheEntry<Raw>>,
    pub(crate) key_format: CacheKeyFormat,
    pub(crate) serializer: S,
    pub(crate) label: BackendLabel,
}

impl<S: Format> std::fmt::Debug for MokaBackend<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaBackend")
            .field("label", &self.label)
            .field("cache", &self.cache)
            .field("key_format", &self.key_format)
            .field("serializer", &self.serializer)
            .finish()
    }
}

impl MokaBackend<JsonFormat> {
    /// Creates a new builder. Capacity must be set before `build()`.
    pub fn builder() -> MokaBackendBuilder<NoCapacity, JsonFormat> {
        MokaBackendBuilder::new()
    }
}

impl<S: Format> MokaBackend<S> {
    /// The underlying Moka cache.
    pub fn cache(&self) -> &Cache<CacheKey, CacheEntry<Raw>> {
        &self.cache
    }
}

#[async_trait]
impl<S> Backend for MokaBackend<S>
where
    S: Format + Send + Sync,
{
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        Ok(self.cache.get(key).await)
    }

    async fn write(
        &self,
        key: &CacheKey,
        entry: CacheEntry<Raw>,
        ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        // Expiry reads the retention deadline off the entry.
        let expires_at = entry.expires_at();
        let evict_at = entry
            .evict_at()
            .or_else(|| ceiling.map(|ceiling| deadline(Utc::now(), ceiling)));
        let entry = CacheEntry::new(entry.into_payload(), expires_at, evict_at);
        tracing::trace!(backend = self.label.as_str(), %key, ?evict_at, "moka write");
        self.cache.insert(key.clone(), entry).await;
        metrics::record_capacity(
            self.label.as_str(),
            self.cache.entry_count(),
            self.cache.weighted_size(),
        );
        Ok(())
    }

    fn label(&self) -> BackendLabel {
        self.label.clone()
    }

    fn value_format(&self) -> &dyn Format {
        &self.serializer
    }

    fn key_format(&self) -> &CacheKeyFormat {
        &self.key_format
    }
}

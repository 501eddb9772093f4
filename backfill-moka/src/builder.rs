//! Builder for configuring [`MokaBackend`].

use std::time::{Duration, Instant};

use backfill_backend::CacheKeyFormat;
use backfill_backend::format::{Format, JsonFormat};
use backfill_core::{BackendLabel, CacheEntry, CacheKey, Raw};
use chrono::Utc;
use moka::Expiry;
use moka::future::{Cache, CacheBuilder};
use moka::policy::EvictionPolicy;

use crate::backend::MokaBackend;

/// Expires entries at their retention deadline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Retention;

impl Expiry<CacheKey, CacheEntry<Raw>> for Retention {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry<Raw>,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.retention(Utc::now())
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry<Raw>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Moka keeps the old deadline by default; a refresh must extend it.
        entry.retention(Utc::now())
    }
}

/// Marker type: capacity has not been configured yet.
///
/// Call either [`max_entries()`](MokaBackendBuilder::max_entries) or
/// [`max_bytes()`](MokaBackendBuilder::max_bytes) before `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Marker type: byte-based capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct ByteCapacity(pub(crate) u64);

/// Builder for creating and configuring a [`MokaBackend`].
///
/// `build()` only exists once capacity is set, through exactly one of
/// [`max_entries`](Self::max_entries) or [`max_bytes`](Self::max_bytes).
///
/// ```
/// use backfill_moka::MokaBackend;
/// use backfill_backend::CacheKeyFormat;
///
/// let backend = MokaBackend::builder()
///     .label("leaderboards")
///     .max_bytes(50_000_000)
///     .key_format(CacheKeyFormat::UrlEncoded)
///     .build();
/// ```
pub struct MokaBackendBuilder<Cap, S = JsonFormat>
where
    S: Format,
{
    capacity: Cap,
    key_format: CacheKeyFormat,
    serializer: S,
    label: BackendLabel,
    eviction_policy: Option<EvictionPolicy>,
}

impl MokaBackendBuilder<NoCapacity, JsonFormat> {
    /// Creates a new builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            key_format: CacheKeyFormat::Bitcode,
            serializer: JsonFormat,
            label: BackendLabel::new_static("moka"),
            eviction_policy: None,
        }
    }
}

impl Default for MokaBackendBuilder<NoCapacity, JsonFormat> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Format> MokaBackendBuilder<NoCapacity, S> {
    /// Hold at most `capacity` entries.
    pub fn max_entries(self, capacity: u64) -> MokaBackendBuilder<EntryCapacity, S> {
        MokaBackendBuilder {
            capacity: EntryCapacity(capacity),
            key_format: self.key_format,
            serializer: self.serializer,
            label: self.label,
            eviction_policy: self.eviction_policy,
        }
    }

    /// Hold at most about `bytes` bytes of keys and encoded payloads.
    pub fn max_bytes(self, bytes: u64) -> MokaBackendBuilder<ByteCapacity, S> {
        MokaBackendBuilder {
            capacity: ByteCapacity(bytes),
            key_format: self.key_format,
            serializer: self.serializer,
            label: self.label,
            eviction_policy: self.eviction_policy,
        }
    }
}

impl<Cap, S: Format> MokaBackendBuilder<Cap, S> {
    /// Sets the label used in logs and metrics. Default `"moka"`.
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the key format reported through [`Backend::key_format`].
    /// Default [`CacheKeyFormat::Bitcode`].
    ///
    /// Moka addresses entries by [`CacheKey`] directly and never encodes
    /// keys, so this only matters to code that reads the setting back,
    /// e.g. to mirror entries into a byte-keyed store.
    ///
    /// [`Backend::key_format`]: backfill_backend::Backend::key_format
    pub fn key_format(mut self, format: CacheKeyFormat) -> Self {
        self.key_format = format;
        self
    }

    /// Sets the eviction policy.
    ///
    /// Defaults to [`EvictionPolicy::tiny_lfu()`] with entry capacity and
    /// [`EvictionPolicy::lru()`] with byte capacity.
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Sets the payload format. Default [`JsonFormat`].
    pub fn value_format<NewS>(self, serializer: NewS) -> MokaBackendBuilder<Cap, NewS>
    where
        NewS: Format,
    {
        MokaBackendBuilder {
            capacity: self.capacity,
            key_format: self.key_format,
            serializer,
            label: self.label,
            eviction_policy: self.eviction_policy,
        }
    }
}

impl<S: Format> MokaBackendBuilder<EntryCapacity, S> {
    /// Builds the [`MokaBackend`] with entry-count based capacity.
    pub fn build(self) -> MokaBackend<S> {
        let policy = self
            .eviction_policy
            .unwrap_or_else(EvictionPolicy::tiny_lfu);
        let cache: Cache<CacheKey, CacheEntry<Raw>> = CacheBuilder::new(self.capacity.0)
            .eviction_policy(policy)
            .expire_after(Retention)
            .build();

        MokaBackend {
            cache,
            key_format: self.key_format,
            serializer: self.serializer,
            label: self.label,
        }
    }
}

impl<S: Format + 'static> MokaBackendBuilder<ByteCapacity, S> {
    /// Builds the [`MokaBackend`] with byte-based capacity.
    ///
    /// Defaults to LRU: TinyLFU admission can reject a new entry even when
    /// evicting would make room.
    pub fn build(self) -> MokaBackend<S> {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::lru);
        let cache: Cache<CacheKey, CacheEntry<Raw>> = CacheBuilder::new(self.capacity.0)
            .weigher(Self::byte_weigher)
            .eviction_policy(policy)
            .expire_after(Retention)
            .build();

        MokaBackend {
            cache,
            key_format: self.key_format,
            serializer: self.serializer,
            label: self.label,
        }
    }

    fn byte_weigher(key: &CacheKey, entry: &CacheEntry<Raw>) -> u32 {
        (key.memory_size() + entry.memory_size()).min(u32::MAX as usize) as u32
    }
}

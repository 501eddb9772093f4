use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use backfill_core::{BackendLabel, CacheEntry, CacheKey, Raw};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    BackendError, CacheKeyFormat,
    format::{Format, FormatExt, JsonFormat},
    metrics::{self, Timer},
};

/// Result type of every backend operation.
pub type BackendResult<T> = Result<T, BackendError>;

/// Raw key-value store for cached entries.
///
/// Stores see payloads as opaque bytes plus the entry's timestamps. The
/// `ceiling` passed to [`write`](Backend::write) bounds how long the store
/// may physically keep the entry, independently of the entry's freshness;
/// stores with native expiry should honor it.
///
/// Backends are shared across tasks and must synchronize internally.
#[async_trait]
pub trait Backend: Sync + Send {
    /// Look `key` up.
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>>;

    /// Create or overwrite the entry under `key`.
    async fn write(
        &self,
        key: &CacheKey,
        entry: CacheEntry<Raw>,
        ceiling: Option<Duration>,
    ) -> BackendResult<()>;

    /// Label used in logs and metrics.
    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("backend")
    }

    /// Format used for payloads.
    fn value_format(&self) -> &dyn Format {
        &JsonFormat
    }

    /// Format used for keys by stores that address entries by bytes.
    fn key_format(&self) -> &CacheKeyFormat {
        &CacheKeyFormat::Bitcode
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for &B {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        (**self).read(key).await
    }

    async fn write(
        &self,
        key: &CacheKey,
        entry: CacheEntry<Raw>,
        ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        (**self).write(key, entry, ceiling).await
    }

    fn label(&self) -> BackendLabel {
        (**self).label()
    }

    fn value_format(&self) -> &dyn Format {
        (**self).value_format()
    }

    fn key_format(&self) -> &CacheKeyFormat {
        (**self).key_format()
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Box<B> {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        (**self).read(key).await
    }

    async fn write(
        &self,
        key: &CacheKey,
        entry: CacheEntry<Raw>,
        ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        (**self).write(key, entry, ceiling).await
    }

    fn label(&self) -> BackendLabel {
        (**self).label()
    }

    fn value_format(&self) -> &dyn Format {
        (**self).value_format()
    }

    fn key_format(&self) -> &CacheKeyFormat {
        (**self).key_format()
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        (**self).read(key).await
    }

    async fn write(
        &self,
        key: &CacheKey,
        entry: CacheEntry<Raw>,
        ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        (**self).write(key, entry, ceiling).await
    }

    fn label(&self) -> BackendLabel {
        (**self).label()
    }

    fn value_format(&self) -> &dyn Format {
        (**self).value_format()
    }

    fn key_format(&self) -> &CacheKeyFormat {
        (**self).key_format()
    }
}

/// Typed cache operations on top of a raw [`Backend`].
///
/// `get` and `set` encode payloads with the backend's
/// [`value_format`](Backend::value_format) and record backend metrics.
/// Every backend gets these through a blanket implementation.
pub trait CacheBackend: Backend {
    /// Read and decode the entry under `key`.
    fn get<T>(
        &self,
        key: &CacheKey,
    ) -> impl Future<Output = BackendResult<Option<CacheEntry<T>>>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            let label = self.label();
            let timer = Timer::new();
            let result = match self.read(key).await {
                Ok(Some(entry)) => {
                    let bytes = entry.payload().len() as u64;
                    let decoded = self
                        .value_format()
                        .deserialize::<T>(entry.payload())
                        .map(|payload| (bytes, Some(entry.map(|_| payload))));
                    decoded.map_err(|error| {
                        tracing::warn!(
                            backend = label.as_str(),
                            %key,
                            %error,
                            "cached payload could not be decoded"
                        );
                        BackendError::from(error)
                    })
                }
                Ok(None) => Ok((0, None)),
                Err(err) => Err(err),
            };
            match result {
                Ok((bytes, entry)) => {
                    metrics::record_read(label.as_str(), bytes, true, timer.elapsed());
                    Ok(entry)
                }
                Err(err) => {
                    metrics::record_read(label.as_str(), 0, false, timer.elapsed());
                    Err(err)
                }
            }
        }
    }

    /// Encode and write `entry` under `key`.
    fn set<T>(
        &self,
        key: &CacheKey,
        entry: &CacheEntry<T>,
        ceiling: Option<Duration>,
    ) -> impl Future<Output = BackendResult<()>> + Send
    where
        T: Serialize + Sync,
    {
        async move {
            let label = self.label();
            let timer = Timer::new();
            let payload = match self.value_format().serialize(entry.payload()) {
                Ok(payload) => payload,
                Err(err) => {
                    metrics::record_write(label.as_str(), 0, false, timer.elapsed());
                    return Err(err.into());
                }
            };
            let bytes = payload.len() as u64;
            let raw = CacheEntry::new(payload, entry.expires_at(), entry.evict_at());
            let result = self.write(key, raw, ceiling).await;
            metrics::record_write(label.as_str(), bytes, result.is_ok(), timer.elapsed());
            result
        }
    }
}

impl<B: Backend + ?Sized> CacheBackend for B {}

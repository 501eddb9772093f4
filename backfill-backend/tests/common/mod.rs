//! In-memory backend addressing entries by encoded key bytes.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use backfill_backend::{
    Backend, BackendError, BackendResult, CacheKeyFormat,
    format::{BincodeFormat, Format, JsonFormat},
};
use backfill_core::{BackendLabel, CacheEntry, CacheKey, Raw};
use dashmap::DashMap;

#[derive(Clone)]
pub struct TestBackend {
    store: Arc<DashMap<Vec<u8>, (CacheEntry<Raw>, Option<Duration>)>>,
    key_format: CacheKeyFormat,
    bincode: bool,
}

impl TestBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            key_format: CacheKeyFormat::Bitcode,
            bincode: false,
        }
    }

    pub fn url_encoded() -> Self {
        Self {
            key_format: CacheKeyFormat::UrlEncoded,
            ..Self::new()
        }
    }

    pub fn bincode() -> Self {
        Self {
            bincode: true,
            ..Self::new()
        }
    }

    pub fn raw_keys(&self) -> Vec<Vec<u8>> {
        self.store.iter().map(|e| e.key().clone()).collect()
    }

    pub fn ceiling_of(&self, key: &CacheKey) -> Option<Duration> {
        let bytes = self.key_format.serialize(key).ok()?;
        self.store.get(&bytes).and_then(|e| e.1)
    }

    pub fn insert_raw(&self, key: &CacheKey, entry: CacheEntry<Raw>) {
        let bytes = self.key_format.serialize(key).unwrap();
        self.store.insert(bytes, (entry, None));
    }
}

#[async_trait]
impl Backend for TestBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        let bytes = self.key_format.serialize(key)?;
        Ok(self.store.get(&bytes).map(|e| e.0.clone()))
    }

    async fn write(
        &self,
        key: &CacheKey,
        entry: CacheEntry<Raw>,
        ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        let bytes = self.key_format.serialize(key)?;
        self.store.insert(bytes, (entry, ceiling));
        Ok(())
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("test")
    }

    fn value_format(&self) -> &dyn Format {
        if self.bincode { &BincodeFormat } else { &JsonFormat }
    }

    fn key_format(&self) -> &CacheKeyFormat {
        &self.key_format
    }
}

/// Backend that fails every call.
pub struct BrokenBackend;

#[async_trait]
impl Backend for BrokenBackend {
    async fn read(&self, _key: &CacheKey) -> BackendResult<Option<CacheEntry<Raw>>> {
        Err(BackendError::ConnectionError(Box::new(
            std::io::Error::other("connection refused"),
        )))
    }

    async fn write(
        &self,
        _key: &CacheKey,
        _entry: CacheEntry<Raw>,
        _ceiling: Option<Duration>,
    ) -> BackendResult<()> {
        Err(BackendError::ConnectionError(Box::new(
            std::io::Error::other("connection refused"),
        )))
    }
}

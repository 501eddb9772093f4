#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// The [`Job`] trait and its policy hooks.
pub mod job;

/// [`CachedJob`]: the stale-while-revalidate policy around a job.
pub mod cache;

/// Error types.
///
/// - [`CacheError`] for lookups and refreshes
/// - [`RefreshError`] for running dispatched refreshes
/// - [`ConfigError`] for loading configuration
pub mod error;

/// Policy-wide configuration, loadable from YAML.
pub mod config;

/// Job registry for running dispatched refreshes.
pub mod registry;

/// In-process dispatcher running refreshes on the tokio runtime.
pub mod offload;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Cache hits, misses, and stale hits per job
/// - Fetch latency and failures
/// - Dispatched and refused refreshes
/// - Offload task lifecycle
pub mod metrics;

pub use cache::CachedJob;
pub use config::{JobOverrides, MAX_ENTRY_LIFETIME, PolicyConfig, PolicyConfigBuilder};
pub use error::{CacheError, ConfigError, RefreshError};
pub use job::{DEFAULT_LIFETIME, Job};
pub use registry::{JobRegistry, Refresh};

pub use backfill_backend::{Backend, BackendError, CacheBackend};
pub use backfill_core::{
    CacheEntry, CacheKey, CallArgs, Clock, DispatchError, Dispatcher, Freshness, JobIdentity,
    KeyError, KeyPart, RefreshRequest, SystemClock,
};

/// The `backfill` prelude.
///
/// ```rust
/// use backfill::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{CacheError, CachedJob, Dispatcher, Job};
}

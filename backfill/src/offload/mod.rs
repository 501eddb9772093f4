//! In-process refresh execution.
//!
//! [`OffloadDispatcher`] is a [`Dispatcher`](backfill_core::Dispatcher)
//! that runs each refresh request as a tokio task against a
//! [`JobRegistry`](crate::JobRegistry), for deployments without an external
//! task queue. Stale hits return immediately while the refresh runs in the
//! background on the same runtime.
//!
//! # Example
//!
//! ```ignore
//! use backfill::offload::{OffloadConfig, OffloadDispatcher};
//!
//! let registry = JobRegistry::new();
//! let dispatcher = OffloadDispatcher::new(registry.clone(), OffloadConfig::default());
//!
//! let leaderboard = CachedJob::new(Leaderboard, backend, dispatcher.clone());
//! registry.register(leaderboard.clone());
//! ```

mod dispatcher;
mod policy;

pub use dispatcher::{OffloadDispatcher, OffloadHandle, OffloadKey};
pub use policy::{OffloadConfig, OffloadConfigBuilder, TimeoutPolicy};

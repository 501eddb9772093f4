//! Traits and structs for backfill backend interaction.
//!
//! A backend is the key-value store job caches read from and write to.
//! Implement [`Backend`] (raw bytes in, raw bytes out) and the typed
//! [`CacheBackend`] operations come for free.
mod backend;
pub mod error;
pub mod format;
mod key;
pub mod metrics;

pub use backend::{Backend, BackendResult, CacheBackend};
pub use error::BackendError;
pub use key::CacheKeyFormat;

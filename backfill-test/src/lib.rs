//! Shared fixtures for backfill tests.
//!
//! - [`MockBackend`]: DashMap-backed store that counts reads and writes
//! - [`ErrorBackend`]: store that fails every call
//! - [`RecordingDispatcher`] / [`FailingDispatcher`]
//! - [`ManualClock`]: a clock tests move by hand

pub mod clock;
pub mod dispatcher;
pub mod mock_backend;

pub use clock::ManualClock;
pub use dispatcher::{FailingDispatcher, RecordingDispatcher};
pub use mock_backend::{BackendCounters, ErrorBackend, MockBackend};

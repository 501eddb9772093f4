//! In-memory store for backfill, powered by [Moka](https://docs.rs/moka).
//!
//! Entries are dropped once their retention deadline passes, so a
//! [`MokaBackend`] honors the write ceiling every job cache passes along.
//! Freshness is unaffected: a stale entry stays readable until then.
//!
//! ```
//! use backfill_moka::MokaBackend;
//!
//! let backend = MokaBackend::builder().max_entries(10_000).build();
//! ```
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod backend;
mod builder;
pub mod metrics;

pub use backend::MokaBackend;
pub use builder::{ByteCapacity, EntryCapacity, MokaBackendBuilder, NoCapacity};
pub use moka::policy::EvictionPolicy;

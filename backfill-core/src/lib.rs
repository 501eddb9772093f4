#![warn(missing_docs)]
//! # backfill-core
//!
//! Core types for the backfill stale-while-revalidate job cache.
//!
//! This crate holds the vocabulary shared by the job cache, its storage
//! backends and its dispatchers:
//!
//! - **Address** cached results ([`CacheKey`], derived from a
//!   [`JobIdentity`] and the call arguments, see [`args`])
//! - **Store** results with a freshness deadline ([`CacheEntry`],
//!   classified by [`Freshness`])
//! - **Hand off** background refreshes ([`Dispatcher`], [`RefreshRequest`])
//! - **Tell time** ([`Clock`])

pub mod args;
pub mod clock;
pub mod dispatch;
pub mod identity;
pub mod key;
pub mod label;
pub mod value;

pub use args::{CallArgs, KeyError};
pub use clock::{Clock, SystemClock};
pub use dispatch::{DispatchError, Dispatcher, RefreshRequest};
pub use identity::JobIdentity;
pub use key::{CacheKey, KeyPart};
pub use label::BackendLabel;
#[doc(hidden)]
pub use smol_str::SmolStr;
pub use value::{CacheEntry, Freshness, deadline};

/// Raw byte data type used for serialized cache payloads.
/// `Bytes` clones by reference count.
pub type Raw = bytes::Bytes;

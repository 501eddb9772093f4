//! Dispatcher trait for out-of-band refreshes.
//!
//! When a cached value is stale, or missing for a job that does not fetch on
//! an empty cache, the job cache hands a [`RefreshRequest`] to a
//! [`Dispatcher`] and returns immediately. Whatever runs the request later
//! looks the job up by its identity and calls its `refresh` with the
//! original arguments.
//!
//! Dispatchers are expected to be non-blocking: push onto a queue, spawn a
//! task, send on a channel. The request itself is serde-serializable so it
//! can cross process boundaries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::JobIdentity;

/// A request to refresh one job's cached value for one set of arguments.
///
/// Carries the call arguments rather than the derived key: the executor
/// rebuilds the key itself through the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// Job to refresh.
    pub job: JobIdentity,
    /// Original call arguments, as JSON.
    pub args: Value,
}

impl RefreshRequest {
    /// Creates a request from already-encoded arguments.
    pub fn new(job: JobIdentity, args: Value) -> Self {
        Self { job, args }
    }

    /// Creates a request by encoding `args`.
    pub fn encode<A: Serialize + ?Sized>(job: JobIdentity, args: &A) -> Result<Self, DispatchError> {
        Ok(Self {
            job,
            args: serde_json::to_value(args)?,
        })
    }
}

/// Failure to hand a refresh request over for execution.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher or its transport cannot accept work right now.
    #[error("dispatcher unavailable: {0}")]
    Unavailable(Box<dyn std::error::Error + Send + Sync>),
    /// Too many refreshes are already in flight.
    #[error("dispatcher saturated: {limit} refreshes already in flight")]
    Saturated {
        /// Configured in-flight limit.
        limit: usize,
    },
    /// Call arguments could not be encoded into the request.
    #[error("call arguments could not be encoded: {0}")]
    Args(#[from] serde_json::Error),
}

/// Hands refresh requests to something that runs them later.
///
/// # Example
///
/// ```
/// use std::sync::Mutex;
/// use backfill_core::{DispatchError, Dispatcher, RefreshRequest};
///
/// #[derive(Default)]
/// struct Outbox(Mutex<Vec<RefreshRequest>>);
///
/// impl Dispatcher for Outbox {
///     fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError> {
///         self.0
///             .lock()
///             .map_err(|err| DispatchError::Unavailable(err.to_string().into()))?
///             .push(request);
///         Ok(())
///     }
/// }
/// ```
pub trait Dispatcher: Send + Sync {
    /// Enqueue `request` without waiting for it to run.
    fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError> {
        (**self).dispatch(request)
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for &D {
    fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError> {
        (**self).dispatch(request)
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError> {
        (**self).dispatch(request)
    }
}

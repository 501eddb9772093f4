use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use backfill_core::{DispatchError, Dispatcher, RefreshRequest};

/// Dispatcher that records every request and runs nothing.
#[derive(Clone, Debug, Default)]
pub struct RecordingDispatcher {
    requests: Arc<Mutex<Vec<RefreshRequest>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RefreshRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RefreshRequest> {
        self.lock().clone()
    }

    /// Drain the recorded requests.
    pub fn take(&self) -> Vec<RefreshRequest> {
        std::mem::take(&mut *self.lock())
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError> {
        self.lock().push(request);
        Ok(())
    }
}

/// Dispatcher whose transport is down.
#[derive(Clone, Debug, Default)]
pub struct FailingDispatcher {
    attempts: Arc<Mutex<usize>>,
}

impl FailingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Dispatcher for FailingDispatcher {
    fn dispatch(&self, _request: RefreshRequest) -> Result<(), DispatchError> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Err(DispatchError::Unavailable(Box::new(std::io::Error::other(
            "broker unreachable",
        ))))
    }
}

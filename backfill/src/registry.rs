//! Running dispatched refreshes.
//!
//! A [`RefreshRequest`] names a job by identity and carries JSON arguments.
//! Whatever consumes requests (a queue worker, the in-process
//! [`OffloadDispatcher`](crate::offload::OffloadDispatcher)) looks the job
//! up in a [`JobRegistry`] and runs its refresh.

use std::sync::Arc;

use async_trait::async_trait;
use backfill_backend::Backend;
use backfill_core::{Clock, Dispatcher, JobIdentity, RefreshRequest};
use dashmap::DashMap;
use serde_json::Value;

use crate::cache::CachedJob;
use crate::error::{CacheError, RefreshError};
use crate::job::Job;

/// Object-safe view of a cached job that can run a refresh from JSON
/// arguments.
#[async_trait]
pub trait Refresh: Send + Sync {
    /// Identity requests use to name this job.
    fn identity(&self) -> &JobIdentity;

    /// Decode `args` and refresh the cached value.
    async fn refresh_value(&self, args: Value) -> Result<(), RefreshError>;
}

#[async_trait]
impl<J, B, D, C> Refresh for CachedJob<J, B, D, C>
where
    J: Job,
    B: Backend,
    D: Dispatcher,
    C: Clock,
{
    fn identity(&self) -> &JobIdentity {
        CachedJob::identity(self)
    }

    async fn refresh_value(&self, args: Value) -> Result<(), RefreshError> {
        let args: J::Args = serde_json::from_value(args).map_err(|source| RefreshError::Args {
            job: self.identity().clone(),
            source,
        })?;
        self.refresh(&args)
            .await
            .map(|_| ())
            .map_err(|err: CacheError<J::Error>| RefreshError::Failed {
                job: self.identity().clone(),
                source: Box::new(err),
            })
    }
}

#[async_trait]
impl<R: Refresh + ?Sized> Refresh for Arc<R> {
    fn identity(&self) -> &JobIdentity {
        (**self).identity()
    }

    async fn refresh_value(&self, args: Value) -> Result<(), RefreshError> {
        (**self).refresh_value(args).await
    }
}

/// Jobs known to an executor, by identity.
///
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobIdentity, Arc<dyn Refresh>>>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.jobs.iter().map(|e| e.key().clone()).collect::<Vec<_>>())
            .finish()
    }
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` under its identity, replacing any job registered
    /// under the same identity.
    pub fn register<R>(&self, job: R) -> &Self
    where
        R: Refresh + 'static,
    {
        self.register_arc(Arc::new(job))
    }

    /// Register an already shared job.
    pub fn register_arc(&self, job: Arc<dyn Refresh>) -> &Self {
        let identity = job.identity().clone();
        if self.jobs.insert(identity.clone(), job).is_some() {
            tracing::debug!(job = %identity, "job re-registered");
        }
        self
    }

    /// Whether a job is registered under `identity`.
    pub fn contains(&self, identity: &JobIdentity) -> bool {
        self.jobs.contains_key(identity)
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no job is registered.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run `request` against the registered job.
    pub async fn execute(&self, request: RefreshRequest) -> Result<(), RefreshError> {
        // Clone out of the map so no shard lock is held across the refresh.
        let job = self
            .jobs
            .get(&request.job)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RefreshError::UnknownJob(request.job.clone()))?;
        job.refresh_value(request.args).await
    }
}

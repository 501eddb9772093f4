//! OffloadDispatcher implementation for in-process refresh execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use backfill_core::{DispatchError, Dispatcher, JobIdentity, RefreshRequest, args::canonical_json};
use dashmap::DashMap;
use smol_str::SmolStr;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use super::policy::{OffloadConfig, TimeoutPolicy};
use crate::registry::JobRegistry;

#[cfg(feature = "metrics")]
use crate::metrics::{
    OFFLOAD_TASK_DURATION, OFFLOAD_TASKS_ACTIVE, OFFLOAD_TASKS_CANCELLED,
    OFFLOAD_TASKS_COMPLETED, OFFLOAD_TASKS_DEDUPLICATED, OFFLOAD_TASKS_SPAWNED,
    OFFLOAD_TASKS_TIMEOUT,
};

/// Key identifying a refresh task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OffloadKey {
    /// Derived from the request itself, so identical requests share it.
    /// Used when deduplication is enabled.
    Request {
        /// Job being refreshed.
        job: JobIdentity,
        /// Canonical JSON of the call arguments.
        args: SmolStr,
    },
    /// Unique per dispatch.
    Generated {
        /// Job being refreshed.
        job: JobIdentity,
        /// Unique identifier within this dispatcher.
        id: u64,
    },
}

impl OffloadKey {
    /// Key shared by every request for the same job and arguments.
    pub fn for_request(request: &RefreshRequest) -> Self {
        Self::Request {
            job: request.job.clone(),
            args: SmolStr::from(canonical_json(&request.args)),
        }
    }

    /// Job the task refreshes.
    pub fn job(&self) -> &JobIdentity {
        match self {
            Self::Request { job, .. } | Self::Generated { job, .. } => job,
        }
    }
}

/// Handle to a spawned refresh task.
#[derive(Debug)]
pub struct OffloadHandle {
    handle: JoinHandle<()>,
}

impl OffloadHandle {
    /// Check if the task is finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Internal state shared across clones.
#[derive(Debug)]
struct OffloadDispatcherInner {
    registry: JobRegistry,
    config: OffloadConfig,
    tasks: DashMap<OffloadKey, OffloadHandle>,
    key_counter: AtomicU64,
}

/// Dispatcher running refreshes as tasks on the current tokio runtime.
///
/// Each request is looked up in the [`JobRegistry`] and refreshed in its own
/// task. Supports a concurrency limit, timeout policies and optional
/// deduplication of identical in-flight requests.
///
/// Dispatching outside a tokio runtime fails with
/// [`DispatchError::Unavailable`].
#[derive(Clone, Debug)]
pub struct OffloadDispatcher {
    inner: Arc<OffloadDispatcherInner>,
}

impl OffloadDispatcher {
    /// Create a new OffloadDispatcher over `registry`.
    pub fn new(registry: JobRegistry, config: OffloadConfig) -> Self {
        Self {
            inner: Arc::new(OffloadDispatcherInner {
                registry,
                config,
                tasks: DashMap::new(),
                key_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Create a new OffloadDispatcher with default configuration.
    pub fn with_defaults(registry: JobRegistry) -> Self {
        Self::new(registry, OffloadConfig::default())
    }

    /// Registry requests are run against.
    pub fn registry(&self) -> &JobRegistry {
        &self.inner.registry
    }

    fn next_key(&self, job: JobIdentity) -> OffloadKey {
        let id = self.inner.key_counter.fetch_add(1, Ordering::Relaxed);
        OffloadKey::Generated { job, id }
    }

    /// Spawn a refresh task for `request`.
    ///
    /// Returns the task key, or `None` when deduplication is enabled and an
    /// identical request is already in flight.
    pub fn spawn(&self, request: RefreshRequest) -> Result<Option<OffloadKey>, DispatchError> {
        let runtime = Handle::try_current().map_err(|err| DispatchError::Unavailable(Box::new(err)))?;

        let key = if self.inner.config.deduplicate {
            OffloadKey::for_request(&request)
        } else {
            self.next_key(request.job.clone())
        };

        if self.inner.config.deduplicate && self.is_in_flight(&key) {
            debug!(?key, "Refresh deduplicated - already in flight");
            #[cfg(feature = "metrics")]
            metrics::counter!(*OFFLOAD_TASKS_DEDUPLICATED, "job" => key.job().to_string())
                .increment(1);
            return Ok(None);
        }

        if let Some(limit) = self.inner.config.max_concurrent_tasks
            && self.active_task_count() >= limit
        {
            return Err(DispatchError::Saturated { limit });
        }

        #[cfg(feature = "metrics")]
        {
            metrics::counter!(*OFFLOAD_TASKS_SPAWNED, "job" => key.job().to_string())
                .increment(1);
            metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "job" => key.job().to_string())
                .increment(1.0);
        }

        // The entry guard holds the shard lock until the handle is stored,
        // so a task finishing on another worker cannot remove its key first.
        let slot = self.inner.tasks.entry(key.clone());
        let handle = self.spawn_inner(&runtime, request, key.clone());
        slot.insert(handle);

        Ok(Some(key))
    }

    /// Get the number of currently active tasks.
    pub fn active_task_count(&self) -> usize {
        self.inner.tasks.iter().filter(|e| !e.is_finished()).count()
    }

    /// Clean up finished task handles.
    pub fn cleanup_finished(&self) {
        self.inner.tasks.retain(|_, handle| !handle.is_finished());
    }

    /// Number of task handles currently tracked, finished or not.
    pub fn tracked_task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Cancel all running tasks and stop tracking them.
    pub fn cancel_all(&self) {
        self.inner.tasks.retain(|key, handle| {
            handle.abort();
            Self::record_cancelled(key);
            false
        });
    }

    /// Check if a task with the given key is in flight.
    pub fn is_in_flight(&self, key: &OffloadKey) -> bool {
        self.inner.tasks.get(key).is_some_and(|h| !h.is_finished())
    }

    /// Wait for all currently tracked tasks to complete.
    pub async fn wait_all(&self) {
        loop {
            self.cleanup_finished();

            if self.inner.tasks.is_empty() {
                break;
            }

            tokio::task::yield_now().await;
        }
    }

    /// Wait for all tasks with a timeout.
    ///
    /// Returns `true` if all tasks completed within the timeout,
    /// `false` if the timeout was reached.
    pub async fn wait_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }

    fn spawn_inner(&self, runtime: &Handle, request: RefreshRequest, key: OffloadKey) -> OffloadHandle {
        let timeout_policy = self.inner.config.timeout_policy.clone();
        let inner = self.inner.clone();

        let span = info_span!(
            "offload_refresh",
            job = %key.job(),
            key = ?key,
        );

        let task = {
            let registry = inner.registry.clone();
            async move {
                if let Err(error) = registry.execute(request).await {
                    warn!(%error, "Refresh failed");
                }
            }
        };

        let handle = match timeout_policy {
            TimeoutPolicy::None => runtime.spawn(
                async move {
                    let start = Instant::now();
                    task.await;
                    if inner.tasks.remove(&key).is_some() {
                        Self::record_completion(start, &key);
                    }
                }
                .instrument(span),
            ),
            TimeoutPolicy::Cancel(duration) => runtime.spawn(
                async move {
                    let start = Instant::now();
                    let finished = tokio::time::timeout(duration, task).await;
                    if inner.tasks.remove(&key).is_none() {
                        return;
                    }
                    match finished {
                        Ok(()) => Self::record_completion(start, &key),
                        Err(_) => {
                            warn!(?key, "Refresh cancelled due to timeout");
                            Self::record_timeout(start, &key);
                        }
                    }
                }
                .instrument(span),
            ),
            TimeoutPolicy::Warn(duration) => runtime.spawn(
                async move {
                    let start = Instant::now();
                    task.await;
                    let elapsed = start.elapsed();
                    if elapsed > duration {
                        warn!(
                            ?key,
                            elapsed_ms = elapsed.as_millis(),
                            threshold_ms = duration.as_millis(),
                            "Refresh exceeded timeout threshold"
                        );
                    }
                    if inner.tasks.remove(&key).is_some() {
                        Self::record_completion(start, &key);
                    }
                }
                .instrument(span),
            ),
        };

        OffloadHandle { handle }
    }

    #[cfg(feature = "metrics")]
    fn record_completion(start: Instant, key: &OffloadKey) {
        let duration = start.elapsed().as_secs_f64();
        let job = key.job().to_string();
        metrics::counter!(*OFFLOAD_TASKS_COMPLETED, "job" => job.clone()).increment(1);
        metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "job" => job.clone()).decrement(1.0);
        metrics::histogram!(*OFFLOAD_TASK_DURATION, "job" => job).record(duration);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_completion(_start: Instant, _key: &OffloadKey) {}

    #[cfg(feature = "metrics")]
    fn record_timeout(start: Instant, key: &OffloadKey) {
        let duration = start.elapsed().as_secs_f64();
        let job = key.job().to_string();
        metrics::counter!(*OFFLOAD_TASKS_TIMEOUT, "job" => job.clone()).increment(1);
        metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "job" => job.clone()).decrement(1.0);
        metrics::histogram!(*OFFLOAD_TASK_DURATION, "job" => job).record(duration);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_timeout(_start: Instant, _key: &OffloadKey) {}

    #[cfg(feature = "metrics")]
    fn record_cancelled(key: &OffloadKey) {
        let job = key.job().to_string();
        metrics::counter!(*OFFLOAD_TASKS_CANCELLED, "job" => job.clone()).increment(1);
        metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "job" => job).decrement(1.0);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_cancelled(_key: &OffloadKey) {}
}

impl Dispatcher for OffloadDispatcher {
    fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError> {
        self.spawn(request).map(|_| ())
    }
}

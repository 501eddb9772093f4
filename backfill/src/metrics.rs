//! Metrics declaration and recording.
//!
//! Everything here is a no-op unless the `metrics` feature is enabled.
//! Cache metrics carry a `job` label; offload metrics carry the job being
//! refreshed under the same label.

use std::time::Duration;

use backfill_core::JobIdentity;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

pub use backfill_backend::metrics::Timer;

#[cfg(feature = "metrics")]
lazy_static! {
    // Cache status metrics

    /// Track number of fresh cache hits.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backfill_cache_hit_total",
            "Total number of fresh cache hits."
        );
        "backfill_cache_hit_total"
    };
    /// Track number of cache misses, including evicted entries.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backfill_cache_miss_total",
            "Total number of cache misses."
        );
        "backfill_cache_miss_total"
    };
    /// Track number of stale cache hits.
    pub static ref CACHE_STALE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "backfill_cache_stale_total",
            "Total number of stale cache hits served while a refresh was dispatched."
        );
        "backfill_cache_stale_total"
    };

    // Fetch metrics

    /// Histogram of job fetch duration.
    pub static ref FETCH_DURATION: &'static str = {
        metrics::describe_histogram!(
            "backfill_fetch_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of job fetches in seconds."
        );
        "backfill_fetch_duration_seconds"
    };
    /// Track number of failed fetches.
    pub static ref FETCH_ERRORS: &'static str = {
        metrics::describe_counter!(
            "backfill_fetch_errors_total",
            "Total number of job fetches that failed."
        );
        "backfill_fetch_errors_total"
    };

    // Dispatch metrics

    /// Track number of refreshes handed to a dispatcher.
    pub static ref DISPATCH_TOTAL: &'static str = {
        metrics::describe_counter!(
            "backfill_dispatch_total",
            "Total number of refresh requests dispatched."
        );
        "backfill_dispatch_total"
    };
    /// Track number of refreshes the dispatcher refused.
    pub static ref DISPATCH_ERRORS: &'static str = {
        metrics::describe_counter!(
            "backfill_dispatch_errors_total",
            "Total number of refresh requests that could not be dispatched."
        );
        "backfill_dispatch_errors_total"
    };

    // Offload dispatcher metrics

    /// Track number of offload tasks spawned.
    pub static ref OFFLOAD_TASKS_SPAWNED: &'static str = {
        metrics::describe_counter!(
            "backfill_offload_tasks_spawned_total",
            "Total number of offload refresh tasks spawned."
        );
        "backfill_offload_tasks_spawned_total"
    };
    /// Track number of offload tasks completed.
    pub static ref OFFLOAD_TASKS_COMPLETED: &'static str = {
        metrics::describe_counter!(
            "backfill_offload_tasks_completed_total",
            "Total number of offload refresh tasks that ran to completion."
        );
        "backfill_offload_tasks_completed_total"
    };
    /// Track number of offload tasks that timed out.
    pub static ref OFFLOAD_TASKS_TIMEOUT: &'static str = {
        metrics::describe_counter!(
            "backfill_offload_tasks_timeout_total",
            "Total number of offload refresh tasks cancelled by timeout."
        );
        "backfill_offload_tasks_timeout_total"
    };
    /// Track number of offload tasks aborted through `cancel_all`.
    pub static ref OFFLOAD_TASKS_CANCELLED: &'static str = {
        metrics::describe_counter!(
            "backfill_offload_tasks_cancelled_total",
            "Total number of offload refresh tasks aborted before completion."
        );
        "backfill_offload_tasks_cancelled_total"
    };
    /// Track number of offload tasks deduplicated (skipped).
    pub static ref OFFLOAD_TASKS_DEDUPLICATED: &'static str = {
        metrics::describe_counter!(
            "backfill_offload_tasks_deduplicated_total",
            "Total number of refresh requests skipped because an identical one was in flight."
        );
        "backfill_offload_tasks_deduplicated_total"
    };
    /// Gauge of currently active offload tasks.
    pub static ref OFFLOAD_TASKS_ACTIVE: &'static str = {
        metrics::describe_gauge!(
            "backfill_offload_tasks_active",
            "Number of currently active offload refresh tasks."
        );
        "backfill_offload_tasks_active"
    };
    /// Histogram of offload task duration.
    pub static ref OFFLOAD_TASK_DURATION: &'static str = {
        metrics::describe_histogram!(
            "backfill_offload_task_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of offload refresh tasks in seconds."
        );
        "backfill_offload_task_duration_seconds"
    };
}

/// Outcome of a cache lookup, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Fresh entry served.
    Hit,
    /// Stale entry served, refresh dispatched.
    Stale,
    /// Nothing usable in the store.
    Miss,
}

/// Record one lookup outcome for `job`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_lookup(job: &JobIdentity, lookup: Lookup) {
    let name = match lookup {
        Lookup::Hit => *CACHE_HIT_COUNTER,
        Lookup::Stale => *CACHE_STALE_COUNTER,
        Lookup::Miss => *CACHE_MISS_COUNTER,
    };
    metrics::counter!(name, "job" => job.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_lookup(_job: &JobIdentity, _lookup: Lookup) {}

/// Record one fetch of `job`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch(job: &JobIdentity, duration: Duration, ok: bool) {
    let job = job.to_string();
    metrics::histogram!(*FETCH_DURATION, "job" => job.clone()).record(duration.as_secs_f64());
    if !ok {
        metrics::counter!(*FETCH_ERRORS, "job" => job).increment(1);
    }
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch(_job: &JobIdentity, _duration: Duration, _ok: bool) {}

/// Record one dispatch attempt for `job`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_dispatch(job: &JobIdentity, ok: bool) {
    let name = if ok { *DISPATCH_TOTAL } else { *DISPATCH_ERRORS };
    metrics::counter!(name, "job" => job.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_dispatch(_job: &JobIdentity, _ok: bool) {}

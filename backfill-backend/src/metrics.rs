//! Backend metrics.
//!
//! Enable the `metrics` feature to record these; without it every recorder
//! below compiles to nothing.
//!
//! - `backfill_backend_read_total` / `backfill_backend_read_errors_total`
//! - `backfill_backend_read_bytes_total`
//! - `backfill_backend_write_total` / `backfill_backend_write_errors_total`
//! - `backfill_backend_write_bytes_total`
//! - `backfill_backend_{read,write}_duration_seconds`
//!
//! Every metric carries a `backend` label.

use std::time::Duration;

#[cfg(feature = "metrics")]
use std::time::Instant;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

/// Zero-cost timer for metrics collection.
///
/// When the `metrics` feature is enabled, this captures the start time.
/// When disabled, this is a zero-sized struct with no overhead.
pub struct Timer {
    #[cfg(feature = "metrics")]
    start: Instant,
}

impl Timer {
    /// Create a new timer, capturing the current instant if metrics enabled.
    #[inline]
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "metrics")]
            start: Instant::now(),
        }
    }

    /// Elapsed duration since timer creation, `Duration::ZERO` without metrics.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        #[cfg(feature = "metrics")]
        {
            self.start.elapsed()
        }
        #[cfg(not(feature = "metrics"))]
        {
            Duration::ZERO
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for total read operations counter.
    pub static ref BACKEND_READ_TOTAL: &'static str = {
        metrics::describe_counter!(
            "backfill_backend_read_total",
            "Total number of cache read operations per backend."
        );
        "backfill_backend_read_total"
    };

    /// Metric name for read errors counter.
    pub static ref BACKEND_READ_ERRORS: &'static str = {
        metrics::describe_counter!(
            "backfill_backend_read_errors_total",
            "Total number of cache read errors per backend."
        );
        "backfill_backend_read_errors_total"
    };

    /// Metric name for total bytes read counter.
    pub static ref BACKEND_READ_BYTES: &'static str = {
        metrics::describe_counter!(
            "backfill_backend_read_bytes_total",
            "Total bytes read from cache per backend."
        );
        "backfill_backend_read_bytes_total"
    };

    /// Metric name for read duration histogram.
    pub static ref BACKEND_READ_DURATION: &'static str = {
        metrics::describe_histogram!(
            "backfill_backend_read_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of backend reads including decoding, in seconds."
        );
        "backfill_backend_read_duration_seconds"
    };

    /// Metric name for total write operations counter.
    pub static ref BACKEND_WRITE_TOTAL: &'static str = {
        metrics::describe_counter!(
            "backfill_backend_write_total",
            "Total number of cache write operations per backend."
        );
        "backfill_backend_write_total"
    };

    /// Metric name for write errors counter.
    pub static ref BACKEND_WRITE_ERRORS: &'static str = {
        metrics::describe_counter!(
            "backfill_backend_write_errors_total",
            "Total number of cache write errors per backend."
        );
        "backfill_backend_write_errors_total"
    };

    /// Metric name for total bytes written counter.
    pub static ref BACKEND_WRITE_BYTES: &'static str = {
        metrics::describe_counter!(
            "backfill_backend_write_bytes_total",
            "Total bytes written to cache per backend."
        );
        "backfill_backend_write_bytes_total"
    };

    /// Metric name for write duration histogram.
    pub static ref BACKEND_WRITE_DURATION: &'static str = {
        metrics::describe_histogram!(
            "backfill_backend_write_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of backend writes including encoding, in seconds."
        );
        "backfill_backend_write_duration_seconds"
    };
}

/// Record one read against `backend`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_read(backend: &str, bytes: u64, ok: bool, duration: Duration) {
    let backend = backend.to_string();
    metrics::counter!(*BACKEND_READ_TOTAL, "backend" => backend.clone()).increment(1);
    metrics::histogram!(*BACKEND_READ_DURATION, "backend" => backend.clone())
        .record(duration.as_secs_f64());
    if ok {
        metrics::counter!(*BACKEND_READ_BYTES, "backend" => backend).increment(bytes);
    } else {
        metrics::counter!(*BACKEND_READ_ERRORS, "backend" => backend).increment(1);
    }
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_read(_backend: &str, _bytes: u64, _ok: bool, _duration: Duration) {}

/// Record one write against `backend`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_write(backend: &str, bytes: u64, ok: bool, duration: Duration) {
    let backend = backend.to_string();
    metrics::counter!(*BACKEND_WRITE_TOTAL, "backend" => backend.clone()).increment(1);
    metrics::histogram!(*BACKEND_WRITE_DURATION, "backend" => backend.clone())
        .record(duration.as_secs_f64());
    if ok {
        metrics::counter!(*BACKEND_WRITE_BYTES, "backend" => backend).increment(bytes);
    } else {
        metrics::counter!(*BACKEND_WRITE_ERRORS, "backend" => backend).increment(1);
    }
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_write(_backend: &str, _bytes: u64, _ok: bool, _duration: Duration) {}

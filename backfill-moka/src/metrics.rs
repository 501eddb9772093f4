//! Moka store capacity metrics.
//!
//! Enable the `metrics` feature to record these.
//!
//! - `backfill_moka_entries` - current number of entries (gauge)
//! - `backfill_moka_size_bytes` - current weighted size (gauge)
//!
//! Both carry a `backend` label.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for cache entry count gauge.
    pub static ref MOKA_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "backfill_moka_entries",
            "Current number of entries in the Moka store."
        );
        "backfill_moka_entries"
    };

    /// Metric name for cache size gauge.
    pub static ref MOKA_SIZE_BYTES: &'static str = {
        metrics::describe_gauge!(
            "backfill_moka_size_bytes",
            "Current weighted size of the Moka store."
        );
        "backfill_moka_size_bytes"
    };
}

/// Record current store size for `backend`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_capacity(backend: &str, entries: u64, size_bytes: u64) {
    metrics::gauge!(*MOKA_ENTRIES, "backend" => backend.to_string()).set(entries as f64);
    metrics::gauge!(*MOKA_SIZE_BYTES, "backend" => backend.to_string()).set(size_bytes as f64);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_capacity(_backend: &str, _entries: u64, _size_bytes: u64) {}

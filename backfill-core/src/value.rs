//! Cached entries with freshness metadata.
//!
//! A [`CacheEntry`] carries two timestamps:
//!
//! - **expires_at** - when the payload stops being fresh. Past this point the
//!   payload is still served, but a background refresh is scheduled.
//! - **evict_at** - the physical retention deadline, derived from the write
//!   ceiling. Backends drop the entry at this point; an entry read after it
//!   is treated as missing.
//!
//! This is the "stale-while-revalidate" model: staleness only decides
//! whether a refresh is scheduled, never whether the value is returned.
//!
//! ```
//! use backfill_core::{CacheEntry, Freshness};
//! use chrono::{TimeDelta, Utc};
//!
//! let now = Utc::now();
//! let entry = CacheEntry::new((1, 2, 3), now + TimeDelta::seconds(600), None);
//!
//! assert!(matches!(entry.clone().freshness(now), Freshness::Fresh(_)));
//! assert!(matches!(
//!     entry.freshness(now + TimeDelta::seconds(601)),
//!     Freshness::Stale(_)
//! ));
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use std::mem::size_of;
use std::time::Duration;

use crate::Raw;

/// A cached payload with its freshness deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    payload: T,
    expires_at: DateTime<Utc>,
    evict_at: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    /// Creates a new entry.
    pub fn new(payload: T, expires_at: DateTime<Utc>, evict_at: Option<DateTime<Utc>>) -> Self {
        CacheEntry {
            payload,
            expires_at,
            evict_at,
        }
    }

    /// Returns a reference to the cached payload.
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// When the payload stops being fresh.
    #[inline]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// When backends may drop the entry.
    #[inline]
    pub fn evict_at(&self) -> Option<DateTime<Utc>> {
        self.evict_at
    }

    /// Consumes the entry and returns the payload.
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Replaces the payload, keeping the timestamps.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            payload: f(self.payload),
            expires_at: self.expires_at,
            evict_at: self.evict_at,
        }
    }

    /// Time left until eviction, measured from `now`.
    ///
    /// `None` when the entry has no retention deadline; `Duration::ZERO`
    /// once the deadline has passed.
    pub fn retention(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.evict_at
            .map(|evict_at| (evict_at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Classifies the entry at `now`.
    pub fn freshness(self, now: DateTime<Utc>) -> Freshness<Self> {
        if let Some(evict_at) = self.evict_at
            && evict_at <= now
        {
            Freshness::Evicted(self)
        } else if self.expires_at < now {
            Freshness::Stale(self)
        } else {
            Freshness::Fresh(self)
        }
    }
}

impl CacheEntry<Raw> {
    /// Returns the estimated memory usage of this entry in bytes.
    pub fn memory_size(&self) -> usize {
        size_of::<Self>() + self.payload.len()
    }
}

/// Freshness of a cached entry at the time it was looked up.
#[derive(Debug, PartialEq, Eq)]
pub enum Freshness<E> {
    /// Within its time-to-live.
    Fresh(E),
    /// Past its time-to-live; serve it and refresh in the background.
    Stale(E),
    /// Past its retention deadline; treat as a miss.
    Evicted(E),
}

impl<E> Freshness<E> {
    /// Name used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh(_) => "fresh",
            Freshness::Stale(_) => "stale",
            Freshness::Evicted(_) => "evicted",
        }
    }
}

/// Adds `duration` to `start`, saturating at the largest representable time.
pub fn deadline(start: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn boundary_instant_is_still_fresh() {
        let entry = CacheEntry::new("v", at(600), None);
        assert!(matches!(entry.clone().freshness(at(600)), Freshness::Fresh(_)));
        assert!(matches!(entry.freshness(at(601)), Freshness::Stale(_)));
    }

    #[test]
    fn eviction_wins_over_staleness() {
        let entry = CacheEntry::new("v", at(600), Some(at(1000)));
        assert!(matches!(entry.clone().freshness(at(999)), Freshness::Stale(_)));
        assert!(matches!(entry.freshness(at(1000)), Freshness::Evicted(_)));
    }

    #[test]
    fn retention_saturates_at_zero() {
        let entry = CacheEntry::new("v", at(600), Some(at(1000)));
        assert_eq!(entry.retention(at(400)), Some(Duration::from_secs(600)));
        assert_eq!(entry.retention(at(2000)), Some(Duration::ZERO));
        assert_eq!(CacheEntry::new("v", at(600), None).retention(at(0)), None);
    }

    #[test]
    fn deadline_saturates() {
        assert_eq!(deadline(at(0), Duration::from_secs(600)), at(600));
        assert_eq!(deadline(at(0), Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }
}

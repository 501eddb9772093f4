//! The [`Job`] trait: what a cached computation looks like.

use std::time::Duration;

use async_trait::async_trait;
use backfill_core::{CacheKey, JobIdentity, KeyError, deadline};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

/// Default freshness window: 10 minutes.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(600);

/// An expensive computation whose result is worth caching.
///
/// Only [`fetch`](Job::fetch) is required. Every other method is a policy
/// hook with a sensible default; override the ones a job needs.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use backfill::Job;
/// use std::{convert::Infallible, time::Duration};
///
/// struct Leaderboard;
///
/// #[async_trait]
/// impl Job for Leaderboard {
///     type Args = (String,);
///     type Output = Vec<String>;
///     type Error = Infallible;
///
///     async fn fetch(&self, args: &Self::Args) -> Result<Vec<String>, Infallible> {
///         Ok(vec![format!("winner of {}", args.0)])
///     }
///
///     fn lifetime(&self) -> Duration {
///         Duration::from_secs(60)
///     }
///
///     fn empty(&self) -> Option<Vec<String>> {
///         Some(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Call arguments.
    ///
    /// Use `()` for jobs without arguments, a tuple for positional arguments
    /// and a struct or map for named ones. Arguments travel with refresh
    /// requests as JSON, so they must survive a JSON round trip.
    type Args: Serialize + DeserializeOwned + Send + Sync;

    /// Computed value.
    type Output: Serialize + DeserializeOwned + Send + Sync;

    /// Failure of [`fetch`](Job::fetch).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Compute the value for `args`.
    async fn fetch(&self, args: &Self::Args) -> Result<Self::Output, Self::Error>;

    /// Name of the job, used to namespace its keys and to find it again when
    /// running a dispatched refresh.
    ///
    /// Defaults to the type path. Override it to keep keys stable across
    /// module moves.
    fn identity(&self) -> JobIdentity {
        JobIdentity::of::<Self>()
    }

    /// How long a computed value stays fresh.
    fn lifetime(&self) -> Duration {
        DEFAULT_LIFETIME
    }

    /// Whether a lookup that finds nothing blocks on a synchronous fetch.
    ///
    /// When `false`, the lookup dispatches a refresh and returns
    /// [`empty`](Job::empty) right away.
    fn fetch_on_empty_miss(&self) -> bool {
        true
    }

    /// Freshness deadline of a value computed at `now`.
    ///
    /// `lifetime` is the effective lifetime, after configuration overrides.
    fn time_to_live(
        &self,
        _args: &Self::Args,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> DateTime<Utc> {
        deadline(now, lifetime)
    }

    /// Bump to orphan every entry of this job without renaming it.
    fn key_version(&self) -> u32 {
        0
    }

    /// Cache key for `args`.
    fn key(&self, args: &Self::Args) -> Result<CacheKey, KeyError> {
        CacheKey::derive(&self.identity(), self.key_version(), args)
    }

    /// Value returned on a miss that does not fetch synchronously.
    fn empty(&self) -> Option<Self::Output> {
        None
    }
}

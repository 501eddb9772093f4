//! The stale-while-revalidate policy around a [`Job`].

use std::{sync::Arc, time::Duration};

use backfill_backend::{Backend, CacheBackend};
use backfill_core::{
    CacheEntry, CacheKey, Clock, DispatchError, Dispatcher, Freshness, JobIdentity,
    RefreshRequest, SystemClock, deadline,
};
use tracing::{debug, warn};

use crate::config::PolicyConfig;
use crate::error::CacheError;
use crate::job::Job;
use crate::metrics::{self, Lookup, Timer};

/// Settings resolved from the job's defaults and the policy configuration.
#[derive(Debug, Clone)]
struct Settings {
    lifetime: Duration,
    fetch_on_empty_miss: bool,
    max_entry_lifetime: Duration,
}

impl Settings {
    fn resolve<J: Job>(job: &J, identity: &JobIdentity, config: &PolicyConfig) -> Self {
        let overrides = config.overrides(identity);
        Self {
            lifetime: overrides
                .and_then(|o| o.lifetime)
                .unwrap_or_else(|| job.lifetime()),
            fetch_on_empty_miss: overrides
                .and_then(|o| o.fetch_on_empty_miss)
                .unwrap_or_else(|| job.fetch_on_empty_miss()),
            max_entry_lifetime: config.max_entry_lifetime,
        }
    }
}

/// A [`Job`] wired to a cache store and a refresh dispatcher.
///
/// [`get`](CachedJob::get) serves cached values and decides when to
/// recompute:
///
/// | store holds | result | side effect |
/// |---|---|---|
/// | fresh entry | cached value | none |
/// | stale entry | cached value | refresh dispatched |
/// | nothing, `fetch_on_empty_miss` | fetched value | fetch + store write |
/// | nothing, otherwise | [`Job::empty`] | refresh dispatched |
///
/// The policy holds no locks and spawns nothing. Concurrent misses for the
/// same key each fetch, and concurrent stale hits each dispatch.
///
/// Clones share the job; backend, dispatcher and clock are cloned, so pass
/// `Arc`s or handles when those should be shared.
#[derive(Debug)]
pub struct CachedJob<J, B, D, C = SystemClock> {
    job: Arc<J>,
    identity: JobIdentity,
    backend: B,
    dispatcher: D,
    clock: C,
    settings: Settings,
}

impl<J, B, D, C> Clone for CachedJob<J, B, D, C>
where
    B: Clone,
    D: Clone,
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            job: self.job.clone(),
            identity: self.identity.clone(),
            backend: self.backend.clone(),
            dispatcher: self.dispatcher.clone(),
            clock: self.clock.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<J, B, D> CachedJob<J, B, D>
where
    J: Job,
{
    /// Wire `job` to `backend` and `dispatcher` with the default policy
    /// configuration and the system clock.
    pub fn new(job: J, backend: B, dispatcher: D) -> Self {
        let identity = job.identity();
        let settings = Settings::resolve(&job, &identity, &PolicyConfig::default());
        CachedJob {
            job: Arc::new(job),
            identity,
            backend,
            dispatcher,
            clock: SystemClock,
            settings,
        }
    }
}

impl<J, B, D, C> CachedJob<J, B, D, C>
where
    J: Job,
{
    /// Replace the clock.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> CachedJob<J, B, D, C2> {
        CachedJob {
            job: self.job,
            identity: self.identity,
            backend: self.backend,
            dispatcher: self.dispatcher,
            clock,
            settings: self.settings,
        }
    }

    /// Apply a policy configuration.
    ///
    /// Overrides registered under this job's identity take precedence over
    /// the job's own defaults.
    pub fn with_config(mut self, config: &PolicyConfig) -> Self {
        self.settings = Settings::resolve(self.job.as_ref(), &self.identity, config);
        self
    }

    /// The wrapped job.
    pub fn job(&self) -> &J {
        &self.job
    }

    /// The job's identity, as used in keys and refresh requests.
    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    /// Effective freshness window.
    pub fn lifetime(&self) -> Duration {
        self.settings.lifetime
    }

    /// Effective miss behavior.
    pub fn fetch_on_empty_miss(&self) -> bool {
        self.settings.fetch_on_empty_miss
    }

    /// Retention ceiling passed to the store on every write.
    pub fn max_entry_lifetime(&self) -> Duration {
        self.settings.max_entry_lifetime
    }

    /// Cache key for `args`.
    pub fn key(&self, args: &J::Args) -> Result<CacheKey, CacheError<J::Error>> {
        Ok(self.job.key(args)?)
    }
}

impl<J, B, D, C> CachedJob<J, B, D, C>
where
    J: Job,
    B: Backend,
    D: Dispatcher,
    C: Clock,
{
    /// Look up the value for `args`, fetching or dispatching a refresh as
    /// the policy requires.
    ///
    /// Returns `Ok(None)` only when the store has nothing, the job does not
    /// fetch on an empty miss and its [`empty`](Job::empty) is `None`.
    ///
    /// Fails only when the key cannot be derived or a synchronous fetch
    /// fails. Store read failures count as misses and dispatch failures
    /// are logged.
    pub async fn get(&self, args: &J::Args) -> Result<Option<J::Output>, CacheError<J::Error>> {
        let key = self.key(args)?;

        let cached = match self.backend.get::<J::Output>(&key).await {
            Ok(cached) => cached,
            Err(error) => {
                warn!(job = %self.identity, %key, %error, "cache read failed, treating as miss");
                None
            }
        };

        match cached.map(|entry| entry.freshness(self.clock.now())) {
            Some(Freshness::Fresh(entry)) => {
                debug!(job = %self.identity, %key, "cache hit");
                metrics::record_lookup(&self.identity, Lookup::Hit);
                Ok(Some(entry.into_payload()))
            }
            Some(Freshness::Stale(entry)) => {
                debug!(
                    job = %self.identity,
                    %key,
                    expired_at = %entry.expires_at(),
                    "stale cache hit, dispatching refresh"
                );
                metrics::record_lookup(&self.identity, Lookup::Stale);
                let _ = self.trigger_async_refresh(&key, args);
                Ok(Some(entry.into_payload()))
            }
            Some(Freshness::Evicted(_)) | None => {
                metrics::record_lookup(&self.identity, Lookup::Miss);
                if self.settings.fetch_on_empty_miss {
                    debug!(job = %self.identity, %key, "cache miss, fetching");
                    self.refresh(args).await.map(Some)
                } else {
                    debug!(job = %self.identity, %key, "cache miss, dispatching refresh");
                    let _ = self.trigger_async_refresh(&key, args);
                    Ok(self.job.empty())
                }
            }
        }
    }

    /// Fetch the value for `args` and store it, whatever the cache holds.
    ///
    /// On fetch failure nothing is written. A failed store write is logged
    /// and the fetched value is still returned.
    pub async fn refresh(&self, args: &J::Args) -> Result<J::Output, CacheError<J::Error>> {
        let key = self.key(args)?;

        let timer = Timer::new();
        let fetched = self.job.fetch(args).await;
        metrics::record_fetch(&self.identity, timer.elapsed(), fetched.is_ok());
        let payload = fetched.map_err(CacheError::Fetch)?;

        let now = self.clock.now();
        let ceiling = self.settings.max_entry_lifetime;
        let entry = CacheEntry::new(
            payload,
            self.job.time_to_live(args, now, self.settings.lifetime),
            Some(deadline(now, ceiling)),
        );

        if let Err(error) = self.backend.set(&key, &entry, Some(ceiling)).await {
            warn!(job = %self.identity, %key, %error, "cache write failed");
        } else {
            debug!(job = %self.identity, %key, expires_at = %entry.expires_at(), "cache refreshed");
        }

        Ok(entry.into_payload())
    }

    /// Hand a refresh of `args` to the dispatcher without waiting for it.
    ///
    /// The request carries the call arguments, not `key`; `key` is only used
    /// for logging. Failures are logged and counted here, so callers are
    /// free to ignore the result.
    pub fn trigger_async_refresh(
        &self,
        key: &CacheKey,
        args: &J::Args,
    ) -> Result<(), DispatchError> {
        let dispatched = RefreshRequest::encode(self.identity.clone(), args)
            .and_then(|request| self.dispatcher.dispatch(request));
        metrics::record_dispatch(&self.identity, dispatched.is_ok());
        if let Err(error) = &dispatched {
            warn!(job = %self.identity, %key, %error, "failed to dispatch refresh");
        }
        dispatched
    }
}

//! Jobs shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backfill::{Job, JobIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Job without arguments returning a fixed triple.
#[derive(Debug, Default)]
pub struct Triple {
    pub calls: Calls,
}

#[async_trait]
impl Job for Triple {
    type Args = ();
    type Output = (u32, u32, u32);
    type Error = std::convert::Infallible;

    async fn fetch(&self, _args: &()) -> Result<Self::Output, Self::Error> {
        self.calls.hit();
        Ok((1, 2, 3))
    }
}

/// Same as [`Triple`], but a cold cache dispatches instead of fetching.
#[derive(Debug, Default)]
pub struct LazyTriple {
    pub calls: Calls,
}

#[async_trait]
impl Job for LazyTriple {
    type Args = ();
    type Output = (u32, u32, u32);
    type Error = std::convert::Infallible;

    async fn fetch(&self, _args: &()) -> Result<Self::Output, Self::Error> {
        self.calls.hit();
        Ok((1, 2, 3))
    }

    fn identity(&self) -> JobIdentity {
        JobIdentity::new("tests::LazyTriple")
    }

    fn fetch_on_empty_miss(&self) -> bool {
        false
    }
}

/// Upper-cases its single argument.
#[derive(Debug, Default)]
pub struct Shout {
    pub calls: Calls,
}

#[async_trait]
impl Job for Shout {
    type Args = (String,);
    type Output = String;
    type Error = std::convert::Infallible;

    async fn fetch(&self, args: &Self::Args) -> Result<String, Self::Error> {
        self.calls.hit();
        Ok(args.0.to_uppercase())
    }

    fn identity(&self) -> JobIdentity {
        JobIdentity::new("tests::Shout")
    }
}

/// Returns a new version number on every fetch, so tests can tell a
/// refreshed value from a cached one.
#[derive(Debug, Default)]
pub struct Versioned {
    pub calls: Calls,
}

#[async_trait]
impl Job for Versioned {
    type Args = (String,);
    type Output = String;
    type Error = std::convert::Infallible;

    async fn fetch(&self, args: &Self::Args) -> Result<String, Self::Error> {
        let version = self.calls.hit();
        Ok(format!("{}@{version}", args.0))
    }

    fn identity(&self) -> JobIdentity {
        JobIdentity::new("tests::Versioned")
    }
}

/// Named arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    pub page: u32,
}

/// Cold cache returns an empty page; short freshness for page 1.
#[derive(Debug, Default)]
pub struct Search {
    pub calls: Calls,
}

#[async_trait]
impl Job for Search {
    type Args = SearchArgs;
    type Output = Vec<String>;
    type Error = std::convert::Infallible;

    async fn fetch(&self, args: &SearchArgs) -> Result<Vec<String>, Self::Error> {
        self.calls.hit();
        Ok(vec![format!("{}#{}", args.query, args.page)])
    }

    fn identity(&self) -> JobIdentity {
        JobIdentity::new("tests::Search")
    }

    fn fetch_on_empty_miss(&self) -> bool {
        false
    }

    fn empty(&self) -> Option<Vec<String>> {
        Some(Vec::new())
    }

    fn time_to_live(
        &self,
        args: &SearchArgs,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> DateTime<Utc> {
        if args.page == 1 {
            now + chrono::TimeDelta::seconds(5)
        } else {
            backfill_core::deadline(now, lifetime)
        }
    }
}

/// Fetch error used by [`Flaky`].
#[derive(Debug, thiserror::Error)]
#[error("upstream down")]
pub struct UpstreamDown;

/// Fails while `failing` is set.
#[derive(Debug, Default)]
pub struct Flaky {
    pub calls: Calls,
    pub failing: Arc<std::sync::atomic::AtomicBool>,
}

impl Flaky {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Job for Flaky {
    type Args = (u32,);
    type Output = u32;
    type Error = UpstreamDown;

    async fn fetch(&self, args: &Self::Args) -> Result<u32, UpstreamDown> {
        let call = self.calls.hit() as u32;
        if self.failing.load(Ordering::SeqCst) {
            Err(UpstreamDown)
        } else {
            Ok(args.0 * 100 + call)
        }
    }

    fn identity(&self) -> JobIdentity {
        JobIdentity::new("tests::Flaky")
    }
}

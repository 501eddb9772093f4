//! Lookup policy: hits, misses, stale hits and what each one triggers.

mod common;

use std::time::Duration;

use backfill::{CacheError, CachedJob, Clock, Job, JobIdentity, PolicyConfig, RefreshRequest};
use backfill_core::{CacheEntry, deadline};
use backfill_test::{ErrorBackend, FailingDispatcher, ManualClock, MockBackend, RecordingDispatcher};
use chrono::TimeDelta;
use common::{Flaky, LazyTriple, Search, SearchArgs, Shout, Triple, Versioned};
use pretty_assertions::assert_eq;
use serde_json::json;

fn shout(name: &str) -> (String,) {
    (name.to_owned(),)
}

#[tokio::test]
async fn cold_cache_fetches_once_then_hits() {
    let backend = MockBackend::new();
    let dispatcher = RecordingDispatcher::new();
    let job = CachedJob::new(Triple::default(), backend.clone(), dispatcher.clone());

    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));
    assert_eq!(job.job().calls.count(), 1);
    assert_eq!(backend.write_count(), 1);

    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));
    assert_eq!(job.job().calls.count(), 1);
    assert_eq!(backend.write_count(), 1);
    assert_eq!(backend.read_hit_count(), 1);
    assert_eq!(dispatcher.count(), 0);
}

#[tokio::test]
async fn fresh_reads_do_not_fetch_again() {
    let backend = MockBackend::new();
    let job = CachedJob::new(Triple::default(), backend.clone(), RecordingDispatcher::new());

    for _ in 0..10 {
        assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));
    }

    assert_eq!(job.job().calls.count(), 1);
    assert_eq!(backend.read_count(), 10);
    assert_eq!(backend.write_count(), 1);
}

#[tokio::test]
async fn lazy_miss_returns_empty_and_dispatches_once() {
    let backend = MockBackend::new();
    let dispatcher = RecordingDispatcher::new();
    let job = CachedJob::new(LazyTriple::default(), backend.clone(), dispatcher.clone());

    assert_eq!(job.get(&()).await.unwrap(), None);
    assert_eq!(job.job().calls.count(), 0);
    assert_eq!(backend.write_count(), 0);
    assert_eq!(
        dispatcher.requests(),
        vec![RefreshRequest::new(
            JobIdentity::new("tests::LazyTriple"),
            serde_json::Value::Null
        )]
    );

    // Run the dispatched refresh the way a worker would.
    for request in dispatcher.take() {
        serde_json::from_value::<()>(request.args).unwrap();
        job.refresh(&()).await.unwrap();
    }

    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));
    assert_eq!(job.job().calls.count(), 1);
    assert_eq!(dispatcher.count(), 0);
}

#[tokio::test]
async fn lazy_miss_returns_typed_empty() {
    let dispatcher = RecordingDispatcher::new();
    let job = CachedJob::new(Search::default(), MockBackend::new(), dispatcher.clone());
    let args = SearchArgs {
        query: "rust".to_owned(),
        page: 2,
    };

    assert_eq!(job.get(&args).await.unwrap(), Some(Vec::new()));
    assert_eq!(dispatcher.requests()[0].args, json!({ "query": "rust", "page": 2 }));
}

#[tokio::test]
async fn positional_arguments_have_independent_entries() {
    let backend = MockBackend::new();
    let job = CachedJob::new(Shout::default(), backend.clone(), RecordingDispatcher::new());

    assert_eq!(job.get(&shout("alan")).await.unwrap().as_deref(), Some("ALAN"));
    assert_eq!(job.get(&shout("barry")).await.unwrap().as_deref(), Some("BARRY"));
    assert_eq!(job.get(&shout("alan")).await.unwrap().as_deref(), Some("ALAN"));

    assert_eq!(job.job().calls.count(), 2);
    assert_eq!(backend.cache_entry_count(), 2);
    assert_ne!(
        job.key(&shout("alan")).unwrap(),
        job.key(&shout("barry")).unwrap()
    );
}

#[tokio::test]
async fn stale_hit_serves_old_value_and_dispatches_original_args() {
    let clock = ManualClock::at(0);
    let dispatcher = RecordingDispatcher::new();
    let job = CachedJob::new(Versioned::default(), MockBackend::new(), dispatcher.clone())
        .with_clock(clock.clone());

    assert_eq!(job.get(&shout("alan")).await.unwrap().as_deref(), Some("alan@1"));

    clock.advance(Duration::from_secs(601));
    assert_eq!(job.get(&shout("alan")).await.unwrap().as_deref(), Some("alan@1"));
    assert_eq!(job.job().calls.count(), 1);

    let requests = dispatcher.take();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].job, JobIdentity::new("tests::Versioned"));
    assert_eq!(requests[0].args, json!(["alan"]));

    job.refresh(&shout("alan")).await.unwrap();
    assert_eq!(job.get(&shout("alan")).await.unwrap().as_deref(), Some("alan@2"));
    assert_eq!(dispatcher.count(), 0);
}

#[tokio::test]
async fn deadline_instant_is_still_fresh() {
    let clock = ManualClock::at(0);
    let dispatcher = RecordingDispatcher::new();
    let job = CachedJob::new(Versioned::default(), MockBackend::new(), dispatcher.clone())
        .with_clock(clock.clone());

    job.get(&shout("alan")).await.unwrap();
    clock.advance(Duration::from_secs(600));
    job.get(&shout("alan")).await.unwrap();

    assert_eq!(dispatcher.count(), 0);
}

#[tokio::test]
async fn unreachable_dispatcher_still_serves_stale_value() {
    let clock = ManualClock::at(0);
    let dispatcher = FailingDispatcher::new();
    let job = CachedJob::new(Triple::default(), MockBackend::new(), dispatcher.clone())
        .with_clock(clock.clone());

    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));

    clock.advance(Duration::from_secs(601));
    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));
    assert_eq!(dispatcher.attempts(), 1);
    assert_eq!(job.job().calls.count(), 1);

    assert!(
        job.trigger_async_refresh(&job.key(&()).unwrap(), &())
            .is_err()
    );
}

#[tokio::test]
async fn lazy_miss_with_unreachable_dispatcher_returns_empty() {
    let dispatcher = FailingDispatcher::new();
    let job = CachedJob::new(LazyTriple::default(), MockBackend::new(), dispatcher.clone());

    assert_eq!(job.get(&()).await.unwrap(), None);
    assert_eq!(dispatcher.attempts(), 1);
}

#[tokio::test]
async fn fetch_failure_propagates_and_writes_nothing() {
    let backend = MockBackend::new();
    let job = CachedJob::new(Flaky::default(), backend.clone(), RecordingDispatcher::new());
    job.job().set_failing(true);

    let result = job.get(&(7,)).await;
    assert!(matches!(result, Err(CacheError::Fetch(_))));
    assert_eq!(backend.write_count(), 0);

    job.job().set_failing(false);
    assert_eq!(job.get(&(7,)).await.unwrap(), Some(702));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_entry() {
    let clock = ManualClock::at(0);
    let backend = MockBackend::new();
    let job = CachedJob::new(Flaky::default(), backend.clone(), RecordingDispatcher::new())
        .with_clock(clock.clone());

    assert_eq!(job.get(&(7,)).await.unwrap(), Some(701));
    let key = job.key(&(7,)).unwrap();
    let before = backend.raw_entry(&key);

    job.job().set_failing(true);
    clock.advance(Duration::from_secs(601));
    assert!(job.refresh(&(7,)).await.is_err());

    assert_eq!(backend.raw_entry(&key), before);
    assert_eq!(job.get(&(7,)).await.unwrap(), Some(701));
}

#[tokio::test]
async fn store_failures_degrade_to_fetching() {
    let backend = ErrorBackend::new();
    let dispatcher = RecordingDispatcher::new();
    let job = CachedJob::new(Triple::default(), backend.clone(), dispatcher.clone());

    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));
    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));

    assert_eq!(job.job().calls.count(), 2);
    assert_eq!(backend.counters.read_count(), 2);
    assert_eq!(backend.counters.write_count(), 2);
    assert_eq!(dispatcher.count(), 0);
}

#[tokio::test]
async fn writes_carry_deadlines_and_ceiling() {
    let clock = ManualClock::at(1_000);
    let backend = MockBackend::new();
    let job = CachedJob::new(Triple::default(), backend.clone(), RecordingDispatcher::new())
        .with_clock(clock.clone());

    job.get(&()).await.unwrap();

    let key = job.key(&()).unwrap();
    let entry = backend.raw_entry(&key).unwrap();
    let now = clock.now();
    assert_eq!(entry.expires_at(), now + TimeDelta::seconds(600));
    assert_eq!(
        entry.evict_at(),
        Some(deadline(now, Duration::from_secs(2_592_000)))
    );
    assert_eq!(backend.ceiling(&key), Some(Duration::from_secs(2_592_000)));
}

#[tokio::test]
async fn evicted_entry_is_a_miss() {
    let clock = ManualClock::at(0);
    let backend = MockBackend::new();
    let job = CachedJob::new(Triple::default(), backend.clone(), RecordingDispatcher::new())
        .with_clock(clock.clone());
    let key = job.key(&()).unwrap();
    let at = |secs| chrono::DateTime::from_timestamp(secs, 0).unwrap();

    backend.seed(&key, CacheEntry::new((9u32, 9u32, 9u32), at(10), Some(at(20))));

    clock.advance(Duration::from_secs(15));
    assert_eq!(job.get(&()).await.unwrap(), Some((9, 9, 9)));

    clock.advance(Duration::from_secs(5));
    assert_eq!(job.get(&()).await.unwrap(), Some((1, 2, 3)));
    assert_eq!(job.job().calls.count(), 1);
}

#[tokio::test]
async fn argument_dependent_time_to_live() {
    let clock = ManualClock::at(0);
    let dispatcher = RecordingDispatcher::new();
    let job = CachedJob::new(Search::default(), MockBackend::new(), dispatcher.clone())
        .with_clock(clock.clone());
    let first = SearchArgs {
        query: "rust".to_owned(),
        page: 1,
    };
    let second = SearchArgs {
        query: "rust".to_owned(),
        page: 2,
    };

    job.refresh(&first).await.unwrap();
    job.refresh(&second).await.unwrap();

    clock.advance(Duration::from_secs(6));
    assert_eq!(job.get(&first).await.unwrap(), Some(vec!["rust#1".to_owned()]));
    assert_eq!(job.get(&second).await.unwrap(), Some(vec!["rust#2".to_owned()]));

    let requests = dispatcher.take();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].args, json!({ "query": "rust", "page": 1 }));
}

#[tokio::test]
async fn config_overrides_job_defaults() {
    let clock = ManualClock::at(0);
    let dispatcher = RecordingDispatcher::new();
    let config = PolicyConfig::builder()
        .max_entry_lifetime(Duration::from_secs(3_600))
        .lifetime("tests::Shout", Duration::from_secs(60))
        .fetch_on_empty_miss("tests::Shout", false)
        .build();
    let backend = MockBackend::new();
    let job = CachedJob::new(Shout::default(), backend.clone(), dispatcher.clone())
        .with_clock(clock.clone())
        .with_config(&config);

    assert_eq!(job.lifetime(), Duration::from_secs(60));
    assert!(!job.fetch_on_empty_miss());
    assert_eq!(job.max_entry_lifetime(), Duration::from_secs(3_600));

    assert_eq!(job.get(&shout("alan")).await.unwrap(), None);
    assert_eq!(dispatcher.take().len(), 1);

    job.refresh(&shout("alan")).await.unwrap();
    let key = job.key(&shout("alan")).unwrap();
    assert_eq!(backend.ceiling(&key), Some(Duration::from_secs(3_600)));

    clock.advance(Duration::from_secs(61));
    assert_eq!(job.get(&shout("alan")).await.unwrap().as_deref(), Some("ALAN"));
    assert_eq!(dispatcher.count(), 1);
}

#[tokio::test]
async fn overrides_for_other_jobs_are_ignored() {
    let config = PolicyConfig::builder()
        .lifetime("tests::Other", Duration::from_secs(1))
        .build();
    let job = CachedJob::new(Shout::default(), MockBackend::new(), RecordingDispatcher::new())
        .with_config(&config);

    assert_eq!(job.lifetime(), backfill::DEFAULT_LIFETIME);
    assert!(job.fetch_on_empty_miss());
}

struct VersionedShout(u32);

#[async_trait::async_trait]
impl Job for VersionedShout {
    type Args = (String,);
    type Output = String;
    type Error = std::convert::Infallible;

    async fn fetch(&self, args: &Self::Args) -> Result<String, Self::Error> {
        Ok(format!("{}:v{}", args.0, self.0))
    }

    fn identity(&self) -> JobIdentity {
        JobIdentity::new("tests::VersionedShout")
    }

    fn key_version(&self) -> u32 {
        self.0
    }
}

#[tokio::test]
async fn bumping_key_version_orphans_old_entries() {
    let backend = MockBackend::new();
    let old = CachedJob::new(VersionedShout(0), backend.clone(), RecordingDispatcher::new());
    let new = CachedJob::new(VersionedShout(1), backend.clone(), RecordingDispatcher::new());

    assert_eq!(old.get(&shout("a")).await.unwrap().as_deref(), Some("a:v0"));
    assert_eq!(new.get(&shout("a")).await.unwrap().as_deref(), Some("a:v1"));
    assert_eq!(old.get(&shout("a")).await.unwrap().as_deref(), Some("a:v0"));
    assert_eq!(backend.cache_entry_count(), 2);
}

#[tokio::test]
async fn yaml_config_applies_by_identity() {
    let config = PolicyConfig::from_yaml(
        r#"
max_entry_lifetime: 1h
jobs:
  "tests::Shout":
    lifetime: 10s
"#,
    )
    .unwrap();
    let job = CachedJob::new(Shout::default(), MockBackend::new(), RecordingDispatcher::new())
        .with_config(&config);

    assert_eq!(job.lifetime(), Duration::from_secs(10));
    assert_eq!(job.max_entry_lifetime(), Duration::from_secs(3_600));
    assert!(job.fetch_on_empty_miss());
}

//! Scheduler driving a real aggregator.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use common::{riverside, start, GatedAdapter, ScriptedAdapter};
use plaza::scheduler::{JobSpec, KnownCity, RunNow};
use plaza::{
    AdapterRegistry, AggregationService, AggregationTarget, Aggregator, EntityStore, FixedClock,
    InMemoryEntityStore, JobControl, JobState, JobTargets, RefreshScheduler,
    StaticTargetDirectory, Trigger,
};

fn directory() -> Arc<StaticTargetDirectory> {
    Arc::new(StaticTargetDirectory::new(vec![
        KnownCity::new("hz", "Hangzhou", 9),
        KnownCity::new("sh", "Shanghai", 1),
    ]))
}

async fn wait_for_calls(adapter: &GatedAdapter, expected: usize) {
    for _ in 0..200 {
        if adapter.calls.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    panic!("adapter never reached {} calls", expected);
}

#[tokio::test]
async fn overlapping_trigger_is_coalesced() {
    let gated = Arc::new(GatedAdapter::new());
    let aggregator = Arc::new(Aggregator::new(
        AdapterRegistry::new().with(gated.clone()),
        Arc::new(InMemoryEntityStore::new()),
    ));
    let clock = FixedClock::new(start());
    let scheduler = RefreshScheduler::new(aggregator.clone(), directory())
        .with_clock(Arc::new(clock.clone()));

    let spec = JobSpec::new(
        "every-second",
        JobTargets::single(AggregationTarget::city("hz", "Hangzhou")),
        Trigger::cron("* * * * * *").unwrap(),
    )
    .max_instances(1);
    let id = scheduler.schedule(spec);
    let first_due = scheduler.job(&id).unwrap().next_run.unwrap();

    let handles = scheduler.tick(first_due);
    assert_eq!(handles.len(), 1);
    wait_for_calls(&gated, 1).await;
    assert_eq!(scheduler.job(&id).unwrap().state, JobState::Running);

    let overlapping = scheduler.tick(first_due + Duration::seconds(1));
    assert!(overlapping.is_empty());

    let job = scheduler.job(&id).unwrap();
    assert_eq!(job.runs_started, 1);
    assert_eq!(job.runs_skipped, 1);
    assert_eq!(job.next_run, Some(first_due + Duration::seconds(2)));

    gated.release(10);
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(aggregator.statistics().runs, 1);
    assert_eq!(gated.calls.load(Ordering::SeqCst), 1);
    let job = scheduler.job(&id).unwrap();
    assert_eq!(job.state, JobState::Scheduled);
    assert_eq!(job.running, 0);
    assert_eq!(job.last_outcome.unwrap().succeeded, 1);
}

#[tokio::test]
async fn manual_run_respects_instance_cap() {
    let gated = Arc::new(GatedAdapter::new());
    let aggregator = Arc::new(Aggregator::new(
        AdapterRegistry::new().with(gated.clone()),
        Arc::new(InMemoryEntityStore::new()),
    ));
    let scheduler = RefreshScheduler::new(aggregator.clone(), directory());
    let spec = JobSpec::new(
        "nightly",
        JobTargets::single(AggregationTarget::city("hz", "Hangzhou")),
        Trigger::cron("0 0 2 * * *").unwrap(),
    )
    .max_instances(1);
    let id = scheduler.schedule(spec);

    let RunNow::Started(handle) = scheduler.run_now(&id) else {
        panic!("first manual run should start");
    };
    wait_for_calls(&gated, 1).await;
    assert!(matches!(scheduler.run_now(&id), RunNow::Coalesced));

    gated.release(1);
    handle.await.unwrap();
    assert_eq!(aggregator.statistics().runs, 1);
}

#[tokio::test]
async fn priority_job_refreshes_top_cities() {
    let alpha = Arc::new(
        ScriptedAdapter::new("alpha").with_areas(vec![riverside("alpha", 120.2, 30.1, 60)]),
    );
    let store = Arc::new(InMemoryEntityStore::new());
    let aggregator: Arc<dyn AggregationService> =
        Arc::new(Aggregator::new(AdapterRegistry::new().with(alpha.clone()), store.clone()));
    let scheduler = RefreshScheduler::new(aggregator, directory());

    let id = scheduler.schedule(
        JobSpec::new(
            "top-one",
            JobTargets::Priority { limit: 1 },
            Trigger::once(start()),
        )
        .force_refresh(true),
    );

    for handle in scheduler.tick(start()) {
        handle.await.unwrap();
    }

    assert_eq!(alpha.area_calls(), 1);
    assert_eq!(store.list_areas_by_city("hz").await.unwrap().len(), 1);
    assert!(store.list_areas_by_city("sh").await.unwrap().is_empty());
    let job = scheduler.job(&id).unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.last_outcome.unwrap().targets, 1);
}

#[tokio::test]
async fn failed_targets_are_reported_in_outcome() {
    let aggregator: Arc<dyn AggregationService> = Arc::new(Aggregator::new(
        AdapterRegistry::new().with(Arc::new(ScriptedAdapter::new("alpha"))),
        Arc::new(InMemoryEntityStore::new()),
    ));
    let scheduler = RefreshScheduler::new(aggregator, directory());
    let id = scheduler.schedule_once(
        JobTargets::Static {
            targets: vec![
                AggregationTarget::area("missing"),
                AggregationTarget::city("hz", "Hangzhou"),
            ],
        },
        start(),
        None,
    );

    let RunNow::Started(handle) = scheduler.run_now(&id) else {
        panic!("manual run should start");
    };
    handle.await.unwrap();

    let outcome = scheduler.job(&id).unwrap().last_outcome.unwrap();
    assert_eq!(outcome.targets, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.succeeded, 1);
}

#[tokio::test]
async fn lifecycle_controls() {
    let aggregator: Arc<dyn AggregationService> = Arc::new(Aggregator::new(
        AdapterRegistry::new(),
        Arc::new(InMemoryEntityStore::new()),
    ));
    let clock = FixedClock::new(start());
    let scheduler =
        RefreshScheduler::new(aggregator, directory()).with_clock(Arc::new(clock.clone()));
    let id = scheduler
        .schedule_recurring("hourly", JobTargets::AllKnown, "0 0 * * * *", None)
        .unwrap();

    assert_eq!(scheduler.pause(&id), JobControl::Applied(JobState::Paused));
    assert_eq!(scheduler.pause(&id), JobControl::Applied(JobState::Paused));
    assert!(scheduler.tick(start() + Duration::hours(1)).is_empty());

    clock.advance(Duration::hours(5));
    assert_eq!(scheduler.resume(&id), JobControl::Applied(JobState::Scheduled));
    assert_eq!(
        scheduler.job(&id).unwrap().next_run,
        Some(start() + Duration::hours(6))
    );

    assert_eq!(scheduler.remove(&id), JobControl::Applied(JobState::Removed));
    assert_eq!(scheduler.resume(&id), JobControl::NotFound);
    assert!(matches!(scheduler.run_now(&id), RunNow::NotFound));
    assert!(scheduler.schedule_recurring("bad", JobTargets::AllKnown, "not cron", None).is_err());
}

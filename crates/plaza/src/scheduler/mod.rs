//! Refresh scheduler.
//!
//! Jobs fire one-off or on cron expressions. Each firing spawns an instance
//! that runs its targets through the aggregation service one after another.
//! A job never has more than `max_instances` instances in flight; a trigger
//! that arrives at the cap is coalesced (counted and dropped) and the job
//! moves on to its next fire time.

mod job;
mod targets;

pub use job::{
    JobControl, JobOutcome, JobSnapshot, JobSpec, JobState, JobTargets, SchedulerError, Trigger,
    DEFAULT_MAX_INSTANCES,
};
pub use targets::{KnownCity, StaticTargetDirectory, TargetDirectory};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{AggregationRequest, AggregationService};
use crate::clock::{Clock, SystemClock};

/// Name of the built-in daily job.
pub const DAILY_REFRESH_JOB: &str = "daily-refresh";
/// Name of the built-in weekly job.
pub const WEEKLY_SYNC_JOB: &str = "weekly-full-sync";

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// How often the run loop checks for due jobs.
    pub poll_interval: Duration,
    pub max_instances: usize,
    pub daily_cron: String,
    pub daily_target_limit: usize,
    pub weekly_cron: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_instances: DEFAULT_MAX_INSTANCES,
            daily_cron: "0 0 2 * * *".to_string(),
            daily_target_limit: 10,
            weekly_cron: "0 0 3 * * Sun".to_string(),
        }
    }
}

/// Outcome of [`RefreshScheduler::run_now`].
#[derive(Debug)]
pub enum RunNow {
    Started(JoinHandle<()>),
    /// The job is already at its instance cap.
    Coalesced,
    NotFound,
}

struct Job {
    id: String,
    spec: JobSpec,
    paused: bool,
    completed: bool,
    running: usize,
    next_run: Option<DateTime<Utc>>,
    runs_started: u64,
    runs_skipped: u64,
    last_started_at: Option<DateTime<Utc>>,
    last_outcome: Option<JobOutcome>,
}

impl Job {
    fn state(&self) -> JobState {
        if self.paused {
            JobState::Paused
        } else if self.running > 0 {
            JobState::Running
        } else if self.completed {
            JobState::Completed
        } else {
            JobState::Scheduled
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            name: self.spec.name.clone(),
            trigger: self.spec.trigger.describe(),
            targets: self.spec.targets.clone(),
            adapters: self.spec.adapters.clone(),
            state: self.state(),
            running: self.running,
            max_instances: self.spec.max_instances,
            force_refresh: self.spec.force_refresh,
            next_run: self.next_run,
            runs_started: self.runs_started,
            runs_skipped: self.runs_skipped,
            last_started_at: self.last_started_at,
            last_outcome: self.last_outcome.clone(),
        }
    }

    fn at_capacity(&self) -> bool {
        self.running >= self.spec.max_instances
    }

    fn begin_instance(&mut self, now: DateTime<Utc>) {
        self.running += 1;
        self.runs_started += 1;
        self.last_started_at = Some(now);
    }
}

type JobTable = Arc<Mutex<Vec<Job>>>;

fn lock(jobs: &JobTable) -> MutexGuard<'_, Vec<Job>> {
    jobs.lock().unwrap_or_else(|e| e.into_inner())
}

/// Releases an instance slot when the instance ends, even if it panicked.
struct InstanceGuard {
    jobs: JobTable,
    id: String,
    outcome: Option<JobOutcome>,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let mut jobs = lock(&self.jobs);
        let Some(job) = jobs.iter_mut().find(|j| j.id == self.id) else {
            return;
        };
        job.running = job.running.saturating_sub(1);
        match self.outcome.take() {
            Some(outcome) => job.last_outcome = Some(outcome),
            None => warn!(job = %job.spec.name, "Job instance ended without finishing"),
        }
        if job.running == 0 && !job.spec.trigger.is_recurring() && job.next_run.is_none() {
            job.completed = true;
        }
    }
}

/// Fires aggregation jobs on one-off and cron triggers.
pub struct RefreshScheduler {
    service: Arc<dyn AggregationService>,
    directory: Arc<dyn TargetDirectory>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    jobs: JobTable,
}

impl RefreshScheduler {
    pub fn new(service: Arc<dyn AggregationService>, directory: Arc<dyn TargetDirectory>) -> Self {
        Self {
            service,
            directory,
            clock: Arc::new(SystemClock),
            settings: SchedulerSettings::default(),
            jobs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Add a job and return its id.
    pub fn schedule(&self, spec: JobSpec) -> String {
        let id = Uuid::new_v4().to_string();
        let next_run = spec.trigger.first_run(self.clock.now());
        info!(
            job = %spec.name,
            id = %id,
            trigger = %spec.trigger.describe(),
            "Scheduled job"
        );
        lock(&self.jobs).push(Job {
            id: id.clone(),
            spec,
            paused: false,
            completed: false,
            running: 0,
            next_run,
            runs_started: 0,
            runs_skipped: 0,
            last_started_at: None,
            last_outcome: None,
        });
        id
    }

    /// One-off job at `at`; past times fire on the next tick.
    pub fn schedule_once(
        &self,
        targets: JobTargets,
        at: DateTime<Utc>,
        adapters: Option<Vec<String>>,
    ) -> String {
        let spec = JobSpec::new("one-off", targets, Trigger::once(at))
            .with_adapters(adapters)
            .max_instances(self.settings.max_instances);
        self.schedule(spec)
    }

    /// Recurring job on a cron expression with a seconds field.
    pub fn schedule_recurring(
        &self,
        name: &str,
        targets: JobTargets,
        expression: &str,
        adapters: Option<Vec<String>>,
    ) -> Result<String, SchedulerError> {
        let spec = JobSpec::new(name, targets, Trigger::cron(expression)?)
            .with_adapters(adapters)
            .max_instances(self.settings.max_instances);
        Ok(self.schedule(spec))
    }

    /// Install the daily priority refresh and the weekly full sync. Jobs that
    /// already exist by name are left alone.
    pub fn register_default_jobs(&self) -> Result<Vec<String>, SchedulerError> {
        let defaults = [
            (
                DAILY_REFRESH_JOB,
                JobTargets::Priority {
                    limit: self.settings.daily_target_limit,
                },
                self.settings.daily_cron.as_str(),
            ),
            (
                WEEKLY_SYNC_JOB,
                JobTargets::AllKnown,
                self.settings.weekly_cron.as_str(),
            ),
        ];

        let mut ids = Vec::with_capacity(defaults.len());
        for (name, targets, expression) in defaults {
            if let Some(existing) = self.find_by_name(name) {
                ids.push(existing);
                continue;
            }
            let spec = JobSpec::new(name, targets, Trigger::cron(expression)?)
                .max_instances(self.settings.max_instances)
                .force_refresh(true);
            ids.push(self.schedule(spec));
        }
        Ok(ids)
    }

    fn find_by_name(&self, name: &str) -> Option<String> {
        lock(&self.jobs)
            .iter()
            .find(|j| j.spec.name == name)
            .map(|j| j.id.clone())
    }

    pub fn pause(&self, id: &str) -> JobControl {
        let mut jobs = lock(&self.jobs);
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return JobControl::NotFound;
        };
        if !job.completed {
            job.paused = true;
            info!(job = %job.spec.name, "Paused job");
        }
        JobControl::Applied(job.state())
    }

    /// Unpause a job. Recurring jobs resume from their next fire time after
    /// now rather than replaying missed ones.
    pub fn resume(&self, id: &str) -> JobControl {
        let now = self.clock.now();
        let mut jobs = lock(&self.jobs);
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return JobControl::NotFound;
        };
        if job.paused {
            job.paused = false;
            if job.spec.trigger.is_recurring() {
                job.next_run = job.spec.trigger.next_after(now);
            }
            info!(job = %job.spec.name, "Resumed job");
        }
        JobControl::Applied(job.state())
    }

    /// Delete a job. Running instances finish but no longer report back.
    pub fn remove(&self, id: &str) -> JobControl {
        let mut jobs = lock(&self.jobs);
        let Some(index) = jobs.iter().position(|j| j.id == id) else {
            return JobControl::NotFound;
        };
        let job = jobs.remove(index);
        info!(job = %job.spec.name, "Removed job");
        JobControl::Applied(JobState::Removed)
    }

    pub fn job(&self, id: &str) -> Option<JobSnapshot> {
        lock(&self.jobs)
            .iter()
            .find(|j| j.id == id)
            .map(Job::snapshot)
    }

    /// All jobs in creation order.
    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        lock(&self.jobs).iter().map(Job::snapshot).collect()
    }

    /// Fire a job immediately, outside its trigger. Respects the instance cap.
    pub fn run_now(&self, id: &str) -> RunNow {
        let now = self.clock.now();
        let spec = {
            let mut jobs = lock(&self.jobs);
            let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
                return RunNow::NotFound;
            };
            if job.at_capacity() {
                job.runs_skipped += 1;
                info!(
                    job = %job.spec.name,
                    running = job.running,
                    "Job at capacity, skipping manual run"
                );
                return RunNow::Coalesced;
            }
            job.begin_instance(now);
            job.spec.clone()
        };
        RunNow::Started(self.spawn_instance(id.to_string(), spec))
    }

    /// Fire every job due at `now`. Returns handles of the spawned instances.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let mut launches = Vec::new();
        {
            let mut jobs = lock(&self.jobs);
            for job in jobs.iter_mut() {
                if job.paused || job.completed {
                    continue;
                }
                match job.next_run {
                    Some(due) if due <= now => {}
                    _ => continue,
                }

                job.next_run = job.spec.trigger.next_after(now);

                if job.at_capacity() {
                    job.runs_skipped += 1;
                    info!(
                        job = %job.spec.name,
                        running = job.running,
                        "Job still running at capacity, coalescing trigger"
                    );
                    continue;
                }

                job.begin_instance(now);
                launches.push((job.id.clone(), job.spec.clone()));
            }
        }

        launches
            .into_iter()
            .map(|(id, spec)| self.spawn_instance(id, spec))
            .collect()
    }

    fn spawn_instance(&self, id: String, spec: JobSpec) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let directory = Arc::clone(&self.directory);
        let clock = Arc::clone(&self.clock);
        let mut guard = InstanceGuard {
            jobs: Arc::clone(&self.jobs),
            id,
            outcome: None,
        };

        tokio::spawn(async move {
            let resolved = targets::resolve(&spec.targets, directory.as_ref()).await;
            info!(job = %spec.name, targets = resolved.len(), "Job instance started");

            let mut outcome = JobOutcome {
                targets: resolved.len(),
                ..Default::default()
            };
            for target in resolved {
                let label = target.to_string();
                let request = AggregationRequest::new(target)
                    .with_adapters(spec.adapters.clone())
                    .force(spec.force_refresh);
                match service.aggregate(request).await {
                    Ok(result) if result.success => {
                        debug!(job = %spec.name, target = %label, "Target aggregated");
                        outcome.succeeded += 1;
                    }
                    Ok(result) => {
                        warn!(
                            job = %spec.name,
                            target = %label,
                            failure = result.failure.as_deref().unwrap_or("unknown"),
                            "Target aggregation failed"
                        );
                        outcome.failed += 1;
                    }
                    Err(e) => {
                        warn!(job = %spec.name, target = %label, "Target rejected: {}", e);
                        outcome.failed += 1;
                    }
                }
            }

            outcome.finished_at = Some(clock.now());
            info!(
                job = %spec.name,
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                "Job instance finished"
            );
            guard.outcome = Some(outcome);
            drop(guard);
        })
    }

    /// Poll for due jobs until `shutdown` flips to true or its sender drops.
    /// Instances already in flight are not cancelled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            jobs = lock(&self.jobs).len(),
            "Refresh scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let launched = self.tick(self.clock.now());
                    if !launched.is_empty() {
                        debug!(instances = launched.len(), "Launched job instances");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Refresh scheduler stopped");
    }
}

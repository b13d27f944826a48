//! Job definitions and snapshots.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;

use crate::aggregate::AggregationTarget;

/// Default simultaneous instances allowed per job.
pub const DEFAULT_MAX_INSTANCES: usize = 3;

/// Errors raised when defining jobs.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// When a job fires.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Fire once at `at` (immediately if already past).
    Once { at: DateTime<Utc> },
    /// Fire on a cron schedule with a seconds field, e.g. `0 0 2 * * *`.
    Recurring {
        expression: String,
        schedule: Box<Schedule>,
    },
}

impl Trigger {
    pub fn once(at: DateTime<Utc>) -> Self {
        Trigger::Once { at }
    }

    pub fn cron(expression: &str) -> Result<Self, SchedulerError> {
        let schedule =
            Schedule::from_str(expression).map_err(|e| SchedulerError::InvalidCron {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Trigger::Recurring {
            expression: expression.to_string(),
            schedule: Box::new(schedule),
        })
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Trigger::Recurring { .. })
    }

    /// First fire time for a job created at `now`.
    pub fn first_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Once { at } => Some(*at),
            Trigger::Recurring { schedule, .. } => schedule.after(&now).next(),
        }
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Once { at } => (*at > after).then_some(*at),
            Trigger::Recurring { schedule, .. } => schedule.after(&after).next(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Trigger::Once { at } => format!("once at {}", at.to_rfc3339()),
            Trigger::Recurring { expression, .. } => format!("cron '{}'", expression),
        }
    }
}

/// Which targets a job aggregates, resolved when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobTargets {
    Static { targets: Vec<AggregationTarget> },
    /// The `limit` highest-priority known cities.
    Priority { limit: usize },
    /// Every known city.
    AllKnown,
}

impl JobTargets {
    pub fn single(target: AggregationTarget) -> Self {
        JobTargets::Static {
            targets: vec![target],
        }
    }
}

/// A job definition.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub targets: JobTargets,
    pub trigger: Trigger,
    pub adapters: Option<Vec<String>>,
    pub max_instances: usize,
    pub force_refresh: bool,
}

impl JobSpec {
    pub fn new(name: &str, targets: JobTargets, trigger: Trigger) -> Self {
        Self {
            name: name.to_string(),
            targets,
            trigger,
            adapters: None,
            max_instances: DEFAULT_MAX_INSTANCES,
            force_refresh: false,
        }
    }

    pub fn with_adapters(mut self, adapters: Option<Vec<String>>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances.max(1);
        self
    }

    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Scheduled,
    Running,
    Paused,
    Completed,
    Removed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Removed => "removed",
        }
    }
}

/// Result of a control operation. Unknown ids are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobControl {
    /// The job is now in this state.
    Applied(JobState),
    NotFound,
}

/// Summary of one finished job instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub name: String,
    pub trigger: String,
    pub targets: JobTargets,
    pub adapters: Option<Vec<String>>,
    pub state: JobState,
    pub running: usize,
    pub max_instances: usize,
    pub force_refresh: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub runs_started: u64,
    /// Triggers dropped because the instance cap was reached.
    pub runs_skipped: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<JobOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    #[test]
    fn daily_cron_fires_at_two() {
        let trigger = Trigger::cron("0 0 2 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let next = trigger.next_after(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 2, 2, 0, 0).unwrap());
    }

    #[test]
    fn weekly_cron_fires_on_sunday() {
        let trigger = Trigger::cron("0 0 3 * * Sun").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let next = trigger.first_run(now).unwrap();
        assert_eq!(next.weekday(), Weekday::Sun);
        assert_eq!(next.hour(), 3);
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let err = Trigger::cron("every tuesday").unwrap_err();
        assert!(err.to_string().contains("every tuesday"));
    }

    #[test]
    fn once_fires_a_single_time() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let trigger = Trigger::once(at);
        assert_eq!(trigger.first_run(at + chrono::Duration::hours(1)), Some(at));
        assert_eq!(trigger.next_after(at), None);
    }
}

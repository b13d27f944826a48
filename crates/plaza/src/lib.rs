//! plaza - multi-source commercial district and merchant aggregation.
//!
//! Pulls area and store observations from independent providers, reconciles
//! them into canonical records, persists them, and keeps them fresh on a
//! schedule.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod freshness;
pub mod identity;
pub mod merge;
pub mod models;
pub mod scheduler;
pub mod sources;
pub mod stats;
pub mod store;

pub use aggregate::{
    AggregationError, AggregationRequest, AggregationResult, AggregationService,
    AggregationTarget, Aggregator, AggregatorOptions,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use freshness::{Freshness, FreshnessGate, FreshnessPolicy};
pub use identity::IdentityKeyer;
pub use merge::{Canonicalizer, MergeOutcome};
pub use models::{
    AreaKind, AreaRecord, Coordinates, RawArea, RawStore, StoreCategory, StoreRecord,
};
pub use scheduler::{
    JobControl, JobSnapshot, JobSpec, JobState, JobTargets, RefreshScheduler, RunNow,
    SchedulerSettings, StaticTargetDirectory, TargetDirectory, Trigger,
};
pub use sources::{AdapterError, AdapterRegistry, AreaScope, CityScope, SourceAdapter};
pub use stats::{RunStatistics, StatsRecorder};
pub use store::{EntityStore, InMemoryEntityStore, SqliteEntityStore, StoreError};

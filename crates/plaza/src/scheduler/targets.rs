//! Resolution of job targets into concrete aggregation targets.

use async_trait::async_trait;

use crate::aggregate::AggregationTarget;

use super::job::JobTargets;

/// A city the scheduler knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownCity {
    pub id: String,
    pub name: String,
    /// Higher refreshes first.
    pub priority: i64,
}

impl KnownCity {
    pub fn new(id: &str, name: &str, priority: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            priority,
        }
    }

    fn target(&self) -> AggregationTarget {
        AggregationTarget::city(&self.id, &self.name)
    }
}

/// Source of the cities recurring jobs refresh.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// The `limit` highest-priority cities.
    async fn priority_targets(&self, limit: usize) -> Vec<AggregationTarget>;

    /// Every known city.
    async fn all_targets(&self) -> Vec<AggregationTarget>;
}

/// Fixed directory built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTargetDirectory {
    cities: Vec<KnownCity>,
}

impl StaticTargetDirectory {
    pub fn new(mut cities: Vec<KnownCity>) -> Self {
        cities.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Self { cities }
    }

    pub fn cities(&self) -> &[KnownCity] {
        &self.cities
    }
}

#[async_trait]
impl TargetDirectory for StaticTargetDirectory {
    async fn priority_targets(&self, limit: usize) -> Vec<AggregationTarget> {
        self.cities.iter().take(limit).map(KnownCity::target).collect()
    }

    async fn all_targets(&self) -> Vec<AggregationTarget> {
        self.cities.iter().map(KnownCity::target).collect()
    }
}

pub(crate) async fn resolve(
    targets: &JobTargets,
    directory: &dyn TargetDirectory,
) -> Vec<AggregationTarget> {
    match targets {
        JobTargets::Static { targets } => targets.clone(),
        JobTargets::Priority { limit } => directory.priority_targets(*limit).await,
        JobTargets::AllKnown => directory.all_targets().await,
    }
}

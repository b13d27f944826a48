//! Canonicalizer: deduplicates and reconciles raw observations.
//!
//! Observations are keyed by identity, grouped in first-seen order, and
//! folded field by field: goodness scores take the maximum, lists take an
//! order-preserving union, descriptions take the longest text, and every
//! other scalar keeps the first value seen. Each rule is idempotent, so
//! merging a canonical set with itself changes nothing.

mod rules;

use std::collections::HashMap;

use tracing::debug;

use crate::identity::IdentityKeyer;
use crate::models::Coordinates;

/// A raw record the canonicalizer can key and fold.
pub trait Observation: Clone + Send + 'static {
    /// Display name used for identity.
    fn label(&self) -> Option<&str>;

    /// Reported position used for identity.
    fn position(&self) -> Option<Coordinates>;

    /// Fold `other` into `self` using the per-field rules.
    fn absorb(&mut self, other: Self);

    /// Record `source` as a contributing provider.
    fn attribute(&mut self, source: &str);
}

/// One canonical entity and its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Canonical<T> {
    pub id: String,
    pub value: T,
}

/// Result of merging one scope's observations.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<T> {
    /// Canonical entities in first-seen order.
    pub entities: Vec<Canonical<T>>,
    /// Observations folded into an earlier entity with the same identity.
    pub collisions: usize,
    /// Observations dropped for missing or invalid identity fields.
    pub rejected: usize,
}

impl<T> Default for MergeOutcome<T> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            collisions: 0,
            rejected: 0,
        }
    }
}

impl<T> MergeOutcome<T> {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Groups observations by identity and resolves conflicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonicalizer {
    keyer: IdentityKeyer,
}

impl Canonicalizer {
    pub fn new(keyer: IdentityKeyer) -> Self {
        Self { keyer }
    }

    pub fn keyer(&self) -> &IdentityKeyer {
        &self.keyer
    }

    /// Identity of an observation, or `None` if it cannot be keyed.
    pub fn identify<T: Observation>(&self, scope: &str, observation: &T) -> Option<String> {
        let name = observation.label().filter(|n| !n.trim().is_empty())?;
        let position = observation.position().filter(Coordinates::is_valid)?;
        Some(self.keyer.key(scope, name, position))
    }

    /// Merge every observation for `scope` into canonical entities.
    pub fn merge<T, I>(&self, scope: &str, observations: I) -> MergeOutcome<T>
    where
        T: Observation,
        I: IntoIterator<Item = T>,
    {
        let mut outcome: MergeOutcome<T> = MergeOutcome::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for observation in observations {
            let Some(id) = self.identify(scope, &observation) else {
                outcome.rejected += 1;
                continue;
            };

            match index.get(&id) {
                Some(&slot) => {
                    outcome.entities[slot].value.absorb(observation);
                    outcome.collisions += 1;
                }
                None => {
                    index.insert(id.clone(), outcome.entities.len());
                    outcome.entities.push(Canonical {
                        id,
                        value: observation,
                    });
                }
            }
        }

        debug!(
            scope,
            entities = outcome.entities.len(),
            collisions = outcome.collisions,
            rejected = outcome.rejected,
            "merged observations"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawArea, RawStore};

    fn riverside(source: &str, lng: f64, lat: f64, hot: i64) -> RawArea {
        RawArea::new(source, "Riverside Plaza", Coordinates::new(lng, lat)).with_hot_value(hot)
    }

    #[test]
    fn riverside_plaza_collapses_to_one_area() {
        let merger = Canonicalizer::default();
        let mut second = riverside("beta", 120.2001, 30.1004, 80);
        second.name = Some("riverside plaza".to_string());

        let outcome = merger.merge("hz", vec![riverside("alpha", 120.200, 30.100, 60), second]);

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.collisions, 1);
        let area = &outcome.entities[0].value;
        assert_eq!(area.hot_value, Some(80));
        assert_eq!(area.name.as_deref(), Some("Riverside Plaza"));
        assert_eq!(area.sources, vec!["alpha", "beta"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let merger = Canonicalizer::default();
        let observations = vec![
            riverside("alpha", 120.200, 30.100, 60).with_tags(&["mall"]),
            riverside("beta", 120.2001, 30.1004, 80)
                .with_tags(&["parking", "mall"])
                .with_description("Riverside shopping complex"),
            RawArea::new("alpha", "Old Town", Coordinates::new(120.16, 30.25)).with_rating(4.1),
        ];

        let once = merger.merge("hz", observations);
        let doubled: Vec<RawArea> = once
            .entities
            .iter()
            .chain(once.entities.iter())
            .map(|c| c.value.clone())
            .collect();
        let twice = merger.merge("hz", doubled);

        assert_eq!(once.entities, twice.entities);
    }

    #[test]
    fn merge_is_conservative() {
        let merger = Canonicalizer::default();
        let a = riverside("alpha", 120.200, 30.100, 60)
            .with_rating(4.5)
            .with_tags(&["mall"])
            .with_description("short");
        let b = riverside("beta", 120.200, 30.100, 40)
            .with_rating(3.9)
            .with_tags(&["cinema"])
            .with_description("a much longer description");

        let outcome = merger.merge("hz", vec![a, b]);
        let area = &outcome.entities[0].value;

        assert_eq!(area.hot_value, Some(60));
        assert_eq!(area.rating, Some(4.5));
        assert_eq!(area.tags, vec!["mall", "cinema"]);
        assert_eq!(area.description.as_deref(), Some("a much longer description"));
    }

    #[test]
    fn missing_identity_fields_are_rejected() {
        let merger = Canonicalizer::default();
        let nameless = RawArea {
            coordinates: Some(Coordinates::new(120.2, 30.1)),
            ..Default::default()
        };
        let unplaced = RawArea {
            name: Some("Nowhere".to_string()),
            ..Default::default()
        };
        let blank = RawArea::new("alpha", "   ", Coordinates::new(120.2, 30.1));
        let off_map = RawArea::new("alpha", "Off Map", Coordinates::new(200.0, 30.1));
        let valid = RawArea::new("alpha", "Old Town", Coordinates::new(120.16, 30.25));

        let outcome = merger.merge("hz", vec![nameless, unplaced, blank, off_map, valid]);

        assert_eq!(outcome.rejected, 4);
        assert_eq!(outcome.entities.len(), 1);
    }

    #[test]
    fn stores_take_max_review_count() {
        let merger = Canonicalizer::default();
        let here = Coordinates::new(120.2, 30.1);
        let a = RawStore::new("alpha", "Noodle Bar", here)
            .with_rating(4.0)
            .with_review_count(120);
        let b = RawStore::new("beta", "noodle bar", here)
            .with_rating(4.6)
            .with_review_count(80);

        let outcome = merger.merge("area-1", vec![a, b]);

        assert_eq!(outcome.entities.len(), 1);
        let store = &outcome.entities[0].value;
        assert_eq!(store.rating, Some(4.6));
        assert_eq!(store.review_count, Some(120));
    }

    #[test]
    fn first_seen_order_is_kept() {
        let merger = Canonicalizer::default();
        let outcome = merger.merge(
            "hz",
            vec![
                RawArea::new("a", "Zeta", Coordinates::new(120.1, 30.1)),
                RawArea::new("a", "Alpha", Coordinates::new(120.3, 30.3)),
                RawArea::new("b", "zeta", Coordinates::new(120.1, 30.1)),
            ],
        );
        let names: Vec<_> = outcome
            .entities
            .iter()
            .filter_map(|c| c.value.name.as_deref())
            .collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }
}

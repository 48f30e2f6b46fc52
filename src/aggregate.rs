//! Per-step rating distribution.
//!
//! The outer key order is the vocabulary order and the inner key order is the
//! order in which each rating value was first seen for that step. Both orders
//! survive serialization because [`OrderedMap`] writes its entries as stored.
use crate::review::ClassifiedReview;
use crate::vocabulary::JourneyVocabulary;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// String-keyed map that keeps insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Insert or replace; a replaced key keeps its original position.
    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value for `key`, appending `make()` at the end when absent.
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        let index = match self.entries.iter().position(|(existing, _)| existing == key) {
            Some(index) => index,
            None => {
                self.entries.push((key.to_string(), make()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Rating value (as a string) to count, in first-seen order.
pub type RatingCounts = OrderedMap<u64>;

/// Journey step to rating counts, in vocabulary order.
pub type RatingDistribution = OrderedMap<RatingCounts>;

/// On-disk shape of a ratings artifact: `{"journeySteps": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingsArtifact {
    #[serde(rename = "journeySteps")]
    pub journey_steps: RatingDistribution,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub distribution: RatingDistribution,
    /// Reviews that contributed a count.
    pub counted: usize,
    /// Reviews whose `journeyStep` is not in the vocabulary.
    pub skipped: usize,
}

impl Aggregation {
    pub fn into_artifact(self) -> RatingsArtifact {
        RatingsArtifact {
            journey_steps: self.distribution,
        }
    }
}

/// Count ratings per journey step.
///
/// Every vocabulary entry gets a (possibly empty) counter, identical
/// duplicates share the first one. Labels outside the vocabulary are skipped.
pub fn aggregate(reviews: &[ClassifiedReview], vocabulary: &JourneyVocabulary) -> Aggregation {
    let mut distribution = RatingDistribution::new();
    for step in vocabulary.steps() {
        distribution.get_or_insert_with(step, RatingCounts::new);
    }

    let mut counted = 0;
    let mut skipped = 0;
    for review in reviews {
        let Some(counts) = distribution.get_mut(&review.journey_step) else {
            tracing::debug!(
                journey_step = %review.journey_step,
                title = %review.title,
                "skipping review with unknown journey step"
            );
            skipped += 1;
            continue;
        };
        *counts.get_or_insert_with(&review.rating_score.to_string(), || 0) += 1;
        counted += 1;
    }

    Aggregation {
        distribution,
        counted,
        skipped,
    }
}

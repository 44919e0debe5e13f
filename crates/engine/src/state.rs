use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

/// Scoring weights and usage count for a single action.
///
/// Weight keys accumulate monotonically: once a feature key has been
/// materialized for an action it stays in the map, explicit zeros included.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionEntry {
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub count: u64,
}

impl ActionEntry {
    /// Linear score: inner product of this entry's weights with `features`.
    ///
    /// Total and pure. Keys without a stored weight contribute 0.0, which
    /// keeps scoring robust against stale state even though the registry
    /// normally materializes every key beforehand.
    pub fn score(&self, features: &FeatureVector) -> f64 {
        features
            .iter()
            .map(|(key, value)| self.weights.get(key).copied().unwrap_or(0.0) * value)
            .sum()
    }

    /// One single-sample stochastic gradient step for a linear reward model:
    /// `w[k] += learning_rate * reward * v` for every feature pair, then the
    /// play count goes up by one.
    ///
    /// No regularization and no normalization: reward and learning-rate
    /// magnitudes fully determine the step size, and unbounded repeated
    /// rewards can make weights diverge. Accepted prototype behavior.
    pub fn apply_update(&mut self, features: &FeatureVector, reward: f64, learning_rate: f64) {
        for (key, value) in features.iter() {
            let weight = self.weights.entry(key.to_string()).or_insert(0.0);
            *weight += learning_rate * reward * value;
        }
        self.count += 1;
    }
}

/// Global policy metadata.
///
/// Serde names keep the persisted document compatible with earlier state
/// files (`lr`, `updates`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyMeta {
    pub epsilon: f64,
    #[serde(rename = "lr")]
    pub learning_rate: f64,
    #[serde(rename = "updates", default)]
    pub update_count: u64,
}

/// Process-wide defaults used to seed fresh state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyDefaults {
    pub epsilon: f64,
    pub learning_rate: f64,
}

/// The root persisted aggregate: every known action plus global metadata.
///
/// `BTreeMap` keeps key ordering stable so persisted snapshots stay
/// diff-friendly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyState {
    #[serde(default)]
    pub actions: BTreeMap<String, ActionEntry>,
    pub meta: PolicyMeta,
}

impl PolicyState {
    pub fn with_defaults(defaults: PolicyDefaults) -> Self {
        Self {
            actions: BTreeMap::new(),
            meta: PolicyMeta {
                epsilon: defaults.epsilon,
                learning_rate: defaults.learning_rate,
                update_count: 0,
            },
        }
    }

    /// Idempotently materializes an entry for `action_id` with a zero weight
    /// for every key in `keys` that the entry does not have yet.
    ///
    /// Existing weights are never overwritten. Scoring and learning for an
    /// action must run after this so weight lookups see explicit entries for
    /// every key in the current request.
    pub fn ensure_action<'a, I>(&mut self, action_id: &str, keys: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entry = self.actions.entry(action_id.to_string()).or_default();
        for key in keys {
            entry.weights.entry(key.to_string()).or_insert(0.0);
        }
    }

    /// Applies one observed reward to `action_id` and bumps the global update
    /// counter. Returns the new counter value.
    ///
    /// The entry is ensured first so every feature key exists before the
    /// weights are written.
    pub fn record_update(&mut self, action_id: &str, features: &FeatureVector, reward: f64) -> u64 {
        self.ensure_action(action_id, features.keys());
        let learning_rate = self.meta.learning_rate;
        if let Some(entry) = self.actions.get_mut(action_id) {
            entry.apply_update(features, reward, learning_rate);
        }
        self.meta.update_count += 1;
        self.meta.update_count
    }
}

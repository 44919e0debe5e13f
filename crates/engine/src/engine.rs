use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::thread_rng;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::features::FeatureVector;
use crate::select::{epsilon_greedy, Mode};
use crate::state::PolicyDefaults;
use crate::store::PolicyStore;

/// Startup configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Canonical location of the persisted policy document.
    pub state_path: PathBuf,
    /// Exploration rate used to seed fresh state.
    pub epsilon: f64,
    /// Learning rate used to seed fresh state.
    pub learning_rate: f64,
    /// Action id returned when a decision is requested with no candidates.
    pub fallback_action: String,
}

/// Outcome of one `act` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Decision {
    pub action_id: String,
    pub mode: Mode,
    pub epsilon: f64,
    /// Per-candidate scores; empty in explore mode and on the fallback path.
    pub scores: BTreeMap<String, f64>,
}

/// Outcome of one `learn` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LearnReceipt {
    pub action_id: String,
    pub reward: f64,
    /// Global update counter after this observation.
    pub updates: u64,
}

/// The policy engine: epsilon-greedy selection over per-action linear
/// scoring functions, with rewards folded in online.
///
/// Each `act`/`learn` call is one serialized load-mutate-save unit against
/// the engine's store.
pub struct Engine {
    store: PolicyStore,
    fallback_action: String,
    default_epsilon: f64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let defaults = PolicyDefaults {
            epsilon: config.epsilon,
            learning_rate: config.learning_rate,
        };
        Self {
            store: PolicyStore::open(config.state_path, defaults),
            fallback_action: config.fallback_action,
            default_epsilon: config.epsilon,
        }
    }

    /// Chooses one of `candidates` for the given context payload.
    ///
    /// An empty candidate list short-circuits to the configured fallback
    /// action and performs no state I/O at all. Otherwise every candidate is
    /// registered with the context's feature keys, the epsilon-greedy draw
    /// runs against the loaded exploration rate, and the (possibly grown)
    /// state is persisted before the decision is returned.
    pub async fn act(&self, context: &Value, candidates: Vec<String>) -> Result<Decision> {
        if candidates.is_empty() {
            debug!("act without candidates, returning fallback action");
            return Ok(Decision {
                action_id: self.fallback_action.clone(),
                mode: Mode::NoActions,
                epsilon: self.default_epsilon,
                scores: BTreeMap::new(),
            });
        }

        let features = FeatureVector::from_value(context);
        let fallback = self.fallback_action.clone();
        self.store
            .with_state(move |state| {
                for action in &candidates {
                    state.ensure_action(action, features.keys());
                }
                let epsilon = state.meta.epsilon;
                let selection = epsilon_greedy(
                    &candidates,
                    epsilon,
                    |action| {
                        state
                            .actions
                            .get(action)
                            .map(|entry| entry.score(&features))
                            .unwrap_or(0.0)
                    },
                    &mut thread_rng(),
                );
                match selection {
                    Some(selection) => Decision {
                        action_id: selection.action,
                        mode: selection.mode,
                        epsilon,
                        scores: selection.scores,
                    },
                    // Unreachable with the emptiness guard above; kept as the
                    // same fallback shape rather than a panic.
                    None => Decision {
                        action_id: fallback,
                        mode: Mode::NoActions,
                        epsilon,
                        scores: BTreeMap::new(),
                    },
                }
            })
            .await
    }

    /// Applies one observed reward for `action_id` under the given context.
    ///
    /// Rejects an empty action id and non-finite rewards before any state is
    /// touched; a non-finite reward would poison the weights irreversibly.
    /// On success the mutated state has been persisted.
    pub async fn learn(&self, context: &Value, action_id: &str, reward: f64) -> Result<LearnReceipt> {
        if action_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "action_id must not be empty".into(),
            ));
        }
        if !reward.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "reward must be a finite number, got {reward}"
            )));
        }

        let features = FeatureVector::from_value(context);
        let action = action_id.to_string();
        self.store
            .with_state(move |state| {
                let updates = state.record_update(&action, &features, reward);
                LearnReceipt {
                    action_id: action,
                    reward,
                    updates,
                }
            })
            .await
    }

    /// Location of the persisted policy document.
    pub fn state_path(&self) -> &std::path::Path {
        self.store.path()
    }
}

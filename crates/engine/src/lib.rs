//! Online decision engine for adaptive action selection.
//!
//! Given a context (named numeric features) and a set of candidate actions,
//! the engine picks one action via an epsilon-greedy policy over per-action
//! linear scoring functions, and folds observed rewards back into those
//! functions one sample at a time. Policy state is a single JSON document,
//! rewritten atomically on every change.

pub mod engine;
pub mod error;
pub mod features;
pub mod select;
pub mod state;
pub mod store;

pub use engine::{Decision, Engine, EngineConfig, LearnReceipt};
pub use error::{EngineError, Result};
pub use features::FeatureVector;
pub use select::{Mode, Selection};
pub use state::{ActionEntry, PolicyDefaults, PolicyMeta, PolicyState};
pub use store::PolicyStore;

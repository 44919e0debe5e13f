use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a decision came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Uniform random pick among the candidates.
    Explore,
    /// Highest-scoring candidate under the current weights.
    Exploit,
    /// No candidates were supplied; the configured fallback action was
    /// returned without consulting the policy at all.
    NoActions,
}

/// Result of one epsilon-greedy draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub action: String,
    pub mode: Mode,
    /// Per-candidate scores. Empty in explore mode, where scores are never
    /// computed.
    pub scores: BTreeMap<String, f64>,
}

/// Epsilon-greedy choice over `candidates`.
///
/// Draws one uniform sample in `[0, 1)`. Below `epsilon` the pick is uniform
/// among the candidates and `score` is never invoked; otherwise every
/// candidate is scored in the given order and the first strict maximum wins
/// (stable argmax, deterministic tie-break). Out-of-range epsilon degrades
/// gracefully: above 1 always explores, below 0 always exploits.
///
/// Returns `None` for an empty candidate list; callers short-circuit to
/// their fallback action before getting here.
///
/// The random source is injected so tests can force either branch.
pub fn epsilon_greedy<R, F>(
    candidates: &[String],
    epsilon: f64,
    score: F,
    rng: &mut R,
) -> Option<Selection>
where
    R: Rng + ?Sized,
    F: Fn(&str) -> f64,
{
    if candidates.is_empty() {
        return None;
    }

    if rng.gen::<f64>() < epsilon {
        let picked = candidates[rng.gen_range(0..candidates.len())].clone();
        return Some(Selection {
            action: picked,
            mode: Mode::Explore,
            scores: BTreeMap::new(),
        });
    }

    let mut scores = BTreeMap::new();
    let mut best: Option<(usize, f64)> = None;
    for (index, action) in candidates.iter().enumerate() {
        let s = score(action);
        scores.insert(action.clone(), s);
        if best.map_or(true, |(_, top)| s > top) {
            best = Some((index, s));
        }
    }
    let (index, _) = best?;

    Some(Selection {
        action: candidates[index].clone(),
        mode: Mode::Exploit,
        scores,
    })
}

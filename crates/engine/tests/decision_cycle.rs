use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use lenkwerk_engine::{Engine, EngineConfig, Mode};

fn config(path: PathBuf, epsilon: f64) -> EngineConfig {
    EngineConfig {
        state_path: path,
        epsilon,
        learning_rate: 0.1,
        fallback_action: "noop".into(),
    }
}

#[tokio::test]
async fn exploit_mode_is_deterministic_for_fixed_state() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(config(dir.path().join("policy.json"), 0.0));
    let context = json!({"features": {"load": 2.0}})["features"].clone();

    engine.learn(&context, "throttle", 1.0).await.unwrap();

    for _ in 0..20 {
        let decision = engine
            .act(&context, vec!["block".into(), "throttle".into()])
            .await
            .unwrap();
        assert_eq!(decision.mode, Mode::Exploit);
        assert_eq!(decision.action_id, "throttle");
        // Inner product: w[load] = 0.1 * 1.0 * 2.0 = 0.2, feature 2.0.
        assert_eq!(decision.scores["throttle"], 0.2 * 2.0);
        assert_eq!(decision.scores["block"], 0.0);
        assert_eq!(decision.epsilon, 0.0);
    }
}

#[tokio::test]
async fn explore_mode_stays_within_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(config(dir.path().join("policy.json"), 1.0));
    let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    for _ in 0..100 {
        let decision = engine
            .act(&json!({"x": 1.0}), candidates.clone())
            .await
            .unwrap();
        assert_eq!(decision.mode, Mode::Explore);
        assert!(candidates.contains(&decision.action_id));
        assert!(decision.scores.is_empty());
    }
}

#[tokio::test]
async fn no_candidates_short_circuits_without_state_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    let engine = Engine::new(config(path.clone(), 0.2));

    let decision = engine.act(&json!({"x": 1.0}), Vec::new()).await.unwrap();
    assert_eq!(decision.action_id, "noop");
    assert_eq!(decision.mode, Mode::NoActions);
    assert!(decision.scores.is_empty());
    assert!(!path.exists(), "fallback path must not persist state");
}

#[tokio::test]
async fn learning_survives_engine_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");

    {
        let engine = Engine::new(config(path.clone(), 0.0));
        let receipt = engine
            .learn(&json!({"f": 2.0}), "block", 3.0)
            .await
            .unwrap();
        assert_eq!(receipt.updates, 1);
        assert_eq!(receipt.reward, 3.0);
    }

    let engine = Engine::new(config(path, 0.0));
    let receipt = engine.learn(&json!({"f": 2.0}), "block", 3.0).await.unwrap();
    // Counter picked up where the previous process left off.
    assert_eq!(receipt.updates, 2);

    let decision = engine
        .act(&json!({"f": 1.0}), vec!["block".into()])
        .await
        .unwrap();
    // Two identical updates: w[f] = 2 * (0.1 * 3.0 * 2.0) = 1.2.
    assert!((decision.scores["block"] - 1.2).abs() < 1e-12);
}

#[tokio::test]
async fn learn_rejects_malformed_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    let engine = Engine::new(config(path.clone(), 0.2));

    let err = engine.learn(&json!({}), "   ", 1.0).await.unwrap_err();
    assert_eq!(err.category(), "invalid-input");

    let err = engine
        .learn(&json!({}), "block", f64::NAN)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "invalid-input");

    let err = engine
        .learn(&json!({}), "block", f64::INFINITY)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "invalid-input");

    assert!(!path.exists(), "rejected input must not touch state");
}

#[tokio::test]
async fn corrupt_state_recovers_to_configured_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, "{definitely not json").unwrap();

    let engine = Engine::new(config(path.clone(), 0.0));
    let decision = engine
        .act(&json!({"x": 1.0}), vec!["a".into(), "b".into()])
        .await
        .unwrap();
    assert_eq!(decision.mode, Mode::Exploit);
    assert_eq!(decision.epsilon, 0.0);

    // The recovered document replaced the corrupt one on disk.
    let receipt = engine.learn(&json!({"x": 1.0}), "a", 1.0).await.unwrap();
    assert_eq!(receipt.updates, 1);
}

#[tokio::test]
async fn concurrent_learns_lose_no_updates() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(Engine::new(config(dir.path().join("policy.json"), 0.0)));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.learn(&json!({"f": 1.0}), "block", 1.0).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let decision = engine
        .act(&json!({"f": 1.0}), vec!["block".into()])
        .await
        .unwrap();
    // 32 updates of 0.1 each, none clobbered by a concurrent writer.
    assert!((decision.scores["block"] - 3.2).abs() < 1e-9);

    let receipt = engine.learn(&json!({"f": 1.0}), "block", 0.0).await.unwrap();
    assert_eq!(receipt.updates, 33);
}

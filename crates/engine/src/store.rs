use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::state::{PolicyDefaults, PolicyState};

/// Durable home of one policy state document.
///
/// Every load-mutate-save unit runs inside the store's mutex, so concurrent
/// requests against the same location are serialized and one writer can never
/// clobber an update another writer persisted after its own load. Stores for
/// different locations share nothing and run fully in parallel. The file I/O
/// itself is blocking and runs on the blocking pool.
pub struct PolicyStore {
    path: PathBuf,
    defaults: PolicyDefaults,
    write_lock: Mutex<()>,
}

impl PolicyStore {
    pub fn open(path: impl Into<PathBuf>, defaults: PolicyDefaults) -> Self {
        Self {
            path: path.into(),
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs one serialized load-mutate-save unit.
    ///
    /// The closure sees the current state (or a fresh default when nothing
    /// readable is on disk), and its result is handed back only after the
    /// full snapshot has been persisted. A failed save fails the whole unit.
    pub async fn with_state<F, T>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut PolicyState) -> T + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let defaults = self.defaults;
        tokio::task::spawn_blocking(move || {
            let mut state = load_or_default(&path, defaults);
            let out = mutate(&mut state);
            persist(&path, &state)?;
            Ok(out)
        })
        .await
        .map_err(|err| EngineError::Internal(format!("state task join failed: {err}")))?
    }
}

/// The single recovery path for unreadable state: a missing, corrupt, or
/// structurally wrong document yields a fresh default state instead of an
/// error. Weights are best-effort and recoverable through continued
/// learning, so availability wins here; the diagnostic goes to the log.
pub fn load_or_default(path: &Path, defaults: PolicyDefaults) -> PolicyState {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read policy state, starting fresh"
                );
            }
            return PolicyState::with_defaults(defaults);
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "malformed policy state, starting fresh"
            );
            PolicyState::with_defaults(defaults)
        }
    }
}

/// Crash-safe full-snapshot save: pretty JSON written to `<path>.tmp`, then
/// atomically renamed onto the canonical path. A reader never observes a
/// partially written document. Failures propagate; a silently dropped save
/// would void the durability the caller was told it has.
pub fn persist(path: &Path, state: &PolicyState) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let body = serde_json::to_vec_pretty(state)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> PolicyDefaults {
        PolicyDefaults {
            epsilon: 0.2,
            learning_rate: 0.05,
        }
    }

    #[test]
    fn missing_file_yields_fresh_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = load_or_default(&dir.path().join("absent.json"), defaults());
        assert!(state.actions.is_empty());
        assert_eq!(state.meta.epsilon, 0.2);
        assert_eq!(state.meta.learning_rate, 0.05);
        assert_eq!(state.meta.update_count, 0);
    }

    #[test]
    fn corrupt_document_yields_fresh_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");

        for garbage in ["{not json", "[1,2,3]", "{\"actions\": 5}"] {
            fs::write(&path, garbage).unwrap();
            let state = load_or_default(&path, defaults());
            assert!(state.actions.is_empty());
            assert_eq!(state.meta.update_count, 0);
        }
    }

    #[test]
    fn persist_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("policy.json");

        let mut state = PolicyState::with_defaults(defaults());
        state.ensure_action("block", ["load"].into_iter());
        state.meta.update_count = 3;

        persist(&path, &state).unwrap();
        let loaded = load_or_default(&path, defaults());
        assert_eq!(loaded, state);
        // No temp residue after a completed save.
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn interrupted_save_never_damages_the_canonical_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");

        let mut prior = PolicyState::with_defaults(defaults());
        prior.meta.update_count = 7;
        persist(&path, &prior).unwrap();

        // Simulate a crash between temp-write and rename: a half-written
        // temp file sits next to the canonical one.
        fs::write(tmp_path(&path), "{\"actions\": {\"blo").unwrap();
        let loaded = load_or_default(&path, defaults());
        assert_eq!(loaded, prior);

        // The next save replaces the stale temp file and completes.
        let mut next = prior.clone();
        next.meta.update_count = 8;
        persist(&path, &next).unwrap();
        assert_eq!(load_or_default(&path, defaults()), next);
    }

    #[test]
    fn persisted_document_has_stable_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");

        let mut state = PolicyState::with_defaults(defaults());
        state.ensure_action("throttle", ["load", "latency"].into_iter());
        persist(&path, &state).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value["actions"]["throttle"]["weights"],
            json!({"latency": 0.0, "load": 0.0})
        );
        assert_eq!(value["meta"]["updates"], json!(0));
    }

    #[tokio::test]
    async fn with_state_persists_the_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        let store = PolicyStore::open(&path, defaults());

        let updates = store
            .with_state(|state| {
                let features =
                    crate::FeatureVector::from_value(&json!({"load": 1.0}));
                state.record_update("block", &features, 1.0)
            })
            .await
            .unwrap();
        assert_eq!(updates, 1);

        let on_disk = load_or_default(&path, defaults());
        assert_eq!(on_disk.meta.update_count, 1);
        assert_eq!(on_disk.actions["block"].count, 1);
    }

    #[tokio::test]
    async fn with_state_surfaces_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        // The state path is a directory, so the rename must fail.
        let path = dir.path().join("taken");
        fs::create_dir_all(&path).unwrap();

        let store = PolicyStore::open(&path, defaults());
        let err = store.with_state(|_| ()).await.unwrap_err();
        assert_eq!(err.category(), "storage-write");
    }
}

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use lenkwerk_engine::EngineConfig;

const DEFAULT_EPSILON: f64 = 0.2;
const DEFAULT_LEARNING_RATE: f64 = 0.05;
const DEFAULT_FALLBACK_ACTION: &str = "noop";
const DEFAULT_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8791);

/// Full service configuration, derived from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub engine: EngineConfig,
    /// Per-request timeout in milliseconds; 0 disables the timeout layer.
    pub timeout_ms: u64,
    /// Maximum in-flight requests; 0 disables the concurrency limit.
    pub concurrency: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let addr = env::var("LENKWERK_ADDR")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(DEFAULT_ADDR));

        let state_path = env::var("LENKWERK_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_state_path());

        Self {
            addr,
            engine: EngineConfig {
                state_path,
                epsilon: env_f64("LENKWERK_EPSILON", DEFAULT_EPSILON),
                learning_rate: env_f64("LENKWERK_LEARNING_RATE", DEFAULT_LEARNING_RATE),
                fallback_action: env::var("LENKWERK_FALLBACK_ACTION")
                    .unwrap_or_else(|_| DEFAULT_FALLBACK_ACTION.to_string()),
            },
            timeout_ms: env_u64("LENKWERK_HTTP_TIMEOUT_MS", 1500),
            concurrency: env_u64("LENKWERK_HTTP_CONCURRENCY", 512),
        }
    }
}

fn default_state_path() -> PathBuf {
    let base = dirs::state_dir().unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".local/state")
    });
    base.join("lenkwerk").join("policy.json")
}

fn env_f64(key: &str, default: f64) -> f64 {
    match env::var(key) {
        Ok(value) => value.parse::<f64>().unwrap_or_else(|_| {
            tracing::warn!("invalid value for {key}='{value}', falling back to {default}");
            default
        }),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!("invalid value for {key}='{value}', falling back to {default}");
            default
        }),
        Err(_) => default,
    }
}

//! HTTP adapter for the lenkwerk decision engine.
//!
//! Thin layer only: request decoding, routing, metrics, and the mapping of
//! engine errors onto machine-readable failure payloads. All policy
//! semantics live in `lenkwerk-engine`.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    error_handling::HandleErrorLayer,
    extract::State,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus_client::{
    encoding::{EncodeLabel, EncodeLabelSet},
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::{limit::ConcurrencyLimitLayer, timeout::TimeoutLayer, BoxError, ServiceBuilder};

use lenkwerk_engine::{Decision, Engine, EngineError, LearnReceipt};

pub mod config;
pub use config::ServiceConfig;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    registry: Arc<Registry>,
    http_requests_total: Family<HttpLabels, Counter>,
    ready: Arc<AtomicBool>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct HttpLabels {
    method: Method,
    path: &'static str,
    status: StatusCode,
}

impl EncodeLabelSet for HttpLabels {
    fn encode(
        &self,
        encoder: &mut prometheus_client::encoding::LabelSetEncoder<'_>,
    ) -> Result<(), fmt::Error> {
        ("method", self.method.as_str()).encode(encoder.encode_label())?;
        ("path", self.path).encode(encoder.encode_label())?;
        ("status", self.status.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

impl AppState {
    fn new(engine: Arc<Engine>) -> Self {
        let mut registry = Registry::default();
        let http_requests_total = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total number of HTTP requests received",
            http_requests_total.clone(),
        );
        Self {
            engine,
            registry: Arc::new(registry),
            http_requests_total,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    fn record_http_request(&self, method: Method, path: &'static str, status: StatusCode) {
        self.http_requests_total
            .get_or_create(&HttpLabels {
                method,
                path,
                status,
            })
            .inc();
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// Engine failures mapped onto transport responses with a stable category.
struct ApiError(EngineError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "category": self.0.category(),
                "message": self.0.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct ActRequest {
    /// Opaque context payload; features are read from `state.features`.
    #[serde(default)]
    state: Value,
    #[serde(default)]
    actions: Vec<String>,
}

#[derive(Deserialize)]
struct LearnRequest {
    #[serde(default)]
    state: Value,
    action_id: String,
    reward: f64,
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    time: String,
}

fn context_features(state: &Value) -> Value {
    state.get("features").cloned().unwrap_or(Value::Null)
}

async fn act(State(state): State<AppState>, Json(req): Json<ActRequest>) -> Response {
    let features = context_features(&req.state);
    match state.engine.act(&features, req.actions).await {
        Ok(decision) => {
            state.record_http_request(Method::POST, "/rl/act", StatusCode::OK);
            Json::<Decision>(decision).into_response()
        }
        Err(err) => {
            let err = ApiError(err);
            state.record_http_request(Method::POST, "/rl/act", err.status());
            err.into_response()
        }
    }
}

async fn learn(State(state): State<AppState>, Json(req): Json<LearnRequest>) -> Response {
    let features = context_features(&req.state);
    match state.engine.learn(&features, &req.action_id, req.reward).await {
        Ok(receipt) => {
            state.record_http_request(Method::POST, "/rl/learn", StatusCode::OK);
            Json::<LearnReceipt>(receipt).into_response()
        }
        Err(err) => {
            let err = ApiError(err);
            state.record_http_request(Method::POST, "/rl/learn", err.status());
            err.into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    state.record_http_request(Method::GET, "/health", StatusCode::OK);
    Json(HealthResponse {
        ok: true,
        time: chrono::Utc::now().to_rfc3339(),
    })
}

async fn ready(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let (status, body) = if state.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    };
    state.record_http_request(Method::GET, "/ready", status);
    (status, body)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let mut body = String::new();
    match prometheus_client::encoding::text::encode(&mut body, &state.registry) {
        Ok(()) => {
            state.record_http_request(Method::GET, "/metrics", StatusCode::OK);
            (
                StatusCode::OK,
                [(CONTENT_TYPE, "text/plain; version=0.0.4")],
                body,
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            state.record_http_request(Method::GET, "/metrics", StatusCode::INTERNAL_SERVER_ERROR);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn build_app(engine: Arc<Engine>, timeout_ms: u64, concurrency: u64) -> Router {
    build_app_with_state(engine, timeout_ms, concurrency).0
}

/// Assembles the router plus its shared state.
///
/// The readiness flag starts unset; the caller flips it once the listener is
/// bound. Timeout and concurrency guards sit in front of the handlers so
/// overload surfaces consistent errors; either guard can be disabled with 0.
pub fn build_app_with_state(
    engine: Arc<Engine>,
    timeout_ms: u64,
    concurrency: u64,
) -> (Router, AppState) {
    let state = AppState::new(engine);

    let timeout_layer = if timeout_ms > 0 {
        Some(TimeoutLayer::new(Duration::from_millis(timeout_ms)))
    } else {
        tracing::info!("request timeout disabled");
        None
    };
    let concurrency_layer = if concurrency > 0 {
        let limit = usize::try_from(concurrency).unwrap_or(usize::MAX);
        Some(ConcurrencyLimitLayer::new(limit))
    } else {
        tracing::info!("concurrency limit disabled");
        None
    };

    let request_guards = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                (StatusCode::REQUEST_TIMEOUT, "request timed out")
            } else {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "service temporarily unavailable",
                )
            }
        }))
        .option_layer(timeout_layer)
        .option_layer(concurrency_layer)
        // `option_layer`'s Either service needs both branches to share one
        // error type, so lift the router's infallible error first.
        .layer(tower::util::MapErrLayer::new(
            |e: std::convert::Infallible| -> BoxError { match e {} },
        ));

    let app = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/rl/act", post(act))
        .route("/rl/learn", post(learn))
        .with_state(state.clone())
        .layer(request_guards);

    (app, state)
}

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lenkwerk_api::{build_app_with_state, ServiceConfig};
use lenkwerk_engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env();
    tracing::info!(
        state_path = %config.engine.state_path.display(),
        epsilon = config.engine.epsilon,
        learning_rate = config.engine.learning_rate,
        fallback_action = %config.engine.fallback_action,
        "starting lenkwerk"
    );

    let engine = Arc::new(Engine::new(config.engine.clone()));
    let (app, state) = build_app_with_state(engine, config.timeout_ms, config.concurrency);

    let listener = TcpListener::bind(config.addr).await?;
    tracing::info!("listening on http://{}", config.addr);
    state.set_ready();

    axum::serve(listener, app).await?;
    Ok(())
}

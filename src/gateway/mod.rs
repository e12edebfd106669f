//! Webhook gateway: axum router, shared state and the server loop.

pub mod api;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::{Config, GatewayConfig};
use crate::conversation::Dispatcher;
use crate::sessions::{create_session_store, SessionSweeper};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub verify_token: Arc<str>,
    /// Enables `X-Hub-Signature-256` checks when present.
    pub app_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn from_config(config: &Config, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            verify_token: Arc::from(config.messenger.verify_token.as_str()),
            app_secret: config.messenger.app_secret().map(Arc::from),
        }
    }
}

/// Event deliveries on `POST /webhook` run to completion; the request timeout
/// only bounds the health check and the subscription handshake.
pub fn create_router(state: AppState, config: &GatewayConfig) -> Router {
    let timeout = TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs));
    Router::new()
        .route("/health", get(api::handle_health).layer(timeout.clone()))
        .route(
            "/webhook",
            post(api::handle_webhook).merge(get(api::handle_verify).layer(timeout)),
        )
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}

/// Run the webhook server until ctrl-c.
pub async fn run_gateway(config: Config, host: &str, port: u16) -> Result<()> {
    let timezone = config.tz()?;
    let repos = crate::repositories::create_repositories(&config).await?;
    let messenger = crate::messenger::create_messenger(&config.messenger);
    let sessions = create_session_store();
    let dispatcher =
        crate::handlers::create_assistant(sessions.clone(), messenger.clone(), repos, timezone);

    if config.messenger.app_secret().is_none() {
        tracing::warn!("No app secret configured; webhook signatures are not checked");
    }

    let sweeper = SessionSweeper::start(
        sessions.clone(),
        Duration::from_secs(config.sessions.sweep_interval_secs),
        Duration::from_secs(config.sessions.inactivity_timeout_secs),
    );

    let app = create_router(AppState::from_config(&config, dispatcher), &config.gateway);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    let addr = listener.local_addr()?;
    tracing::info!(
        %addr,
        sessions = sessions.name(),
        messenger = messenger.name(),
        timezone = %timezone,
        "Gateway listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.shutdown().await;
    tracing::info!("Gateway stopped");
    served.context("Gateway server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

//! HTTP/WebSocket server.

pub mod routes;
pub mod ws;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::filter::HallucinationFilter;
use crate::stt::SharedEngine;
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: SharedEngine,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config, engine: SharedEngine) -> Self {
        let filter =
            HallucinationFilter::with_phrases(config.filter.extra_phrases.iter().cloned());
        let dispatcher = Dispatcher::new(engine.clone(), Arc::new(filter), config.dispatch.clone());
        Self {
            config: Arc::new(config),
            engine,
            dispatcher,
        }
    }
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: Config, engine: SharedEngine) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, engine);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

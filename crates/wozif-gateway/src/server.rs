use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use wozif_core::config::GatewayConfig;
use wozif_knowledge::KnowledgeBase;
use wozif_workflow::NodeExecutor;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    executor: NodeExecutor,
    knowledge: Arc<KnowledgeBase>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, executor: NodeExecutor, knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            config,
            executor,
            knowledge,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            executor: self.executor.clone(),
            knowledge: self.knowledge.clone(),
        });

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/execute", post(routes::execute))
        .route("/api/health", get(routes::health))
        .route("/api/knowledge/reload", post(routes::reload_knowledge))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

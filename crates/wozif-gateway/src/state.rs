use std::sync::Arc;

use wozif_core::config::GatewayConfig;
use wozif_knowledge::KnowledgeBase;
use wozif_workflow::NodeExecutor;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub executor: NodeExecutor,
    pub knowledge: Arc<KnowledgeBase>,
}

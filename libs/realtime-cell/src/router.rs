use std::sync::Arc;

use axum::{routing::get, Router};

use catalogue_cell::Catalogue;
use shared_config::AppConfig;

use crate::handlers::ws_upgrade;
use crate::services::RealtimeHub;

#[derive(Clone)]
pub struct RealtimeState {
    pub config: Arc<AppConfig>,
    pub hub: RealtimeHub,
    pub catalogue: Arc<dyn Catalogue>,
}

/// Authentication happens inside the upgrade handler, not in middleware.
pub fn realtime_routes(state: RealtimeState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

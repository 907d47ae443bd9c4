use axum::{routing::get, Router};

use appointment_cell::appointment_routes;
use realtime_cell::realtime_routes;

use crate::state::AppServices;

pub fn create_router(services: AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Hospital booking API is running!" }))
        .nest("/appointments", appointment_routes(services.appointments))
        .merge(realtime_routes(services.realtime))
}

// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::AppointmentBookingService;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
}

pub fn appointment_routes(state: AppointmentState) -> Router {
    // Patients book and browse availability without an account
    let public_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/appointed-dates/{service_id}", get(handlers::get_appointed_dates))
        .route("/available-dates/{service_id}", get(handlers::get_available_dates));

    let protected_routes = Router::new()
        .route("/", get(handlers::get_hospital_appointments))
        .route(
            "/{appointment_id}",
            delete(handlers::delete_appointment).put(handlers::update_appointment),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{AppointmentError, AvailableDatesQuery, CreateAppointmentRequest, UpdateAppointmentRequest};
use crate::router::AppointmentState;

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

/// Patient-initiated booking; no authentication required.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateAppointmentRequest>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let outcome = state.booking.create(request).await.map_err(|e| match e {
        AppointmentError::ServiceNotFound(_) => AppError::BadRequest("Unknown service".to_string()),
        other => other.into(),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment created",
            "appointment": outcome.appointment
        })),
    ))
}

pub async fn get_appointed_dates(
    State(state): State<AppointmentState>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let dates = state.booking.appointed_dates(service_id).await?;
    Ok(Json(json!({ "appointedDates": dates })))
}

pub async fn get_available_dates(
    State(state): State<AppointmentState>,
    Path(service_id): Path<Uuid>,
    Query(query): Query<AvailableDatesQuery>,
) -> Result<Json<Value>, AppError> {
    let dates = state
        .booking
        .available_dates(service_id, query.from, query.to)
        .await?;
    Ok(Json(json!({ "availableDates": dates })))
}

// ==============================================================================
// HOSPITAL HANDLERS
// ==============================================================================

pub async fn get_hospital_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = owned_hospital(&state, &user).await?;
    let appointments = state.booking.list_by_hospital(hospital_id).await?;
    Ok(Json(json!({ "appointments": appointments })))
}

pub async fn delete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = owned_hospital(&state, &user).await?;
    state.booking.remove(appointment_id, hospital_id).await?;

    info!("Hospital {} cancelled appointment {}", hospital_id, appointment_id);
    Ok(Json(json!({ "message": "Appointment cancelled" })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateAppointmentRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    let hospital_id = owned_hospital(&state, &user).await?;
    let outcome = state.booking.update(appointment_id, hospital_id, request).await?;

    Ok(Json(json!({
        "message": "Appointment updated",
        "appointment": outcome.appointment
    })))
}

/// The hospital owned by the caller. Non-hospital roles are 403.
async fn owned_hospital(state: &AppointmentState, user: &User) -> Result<Uuid, AppError> {
    require_role(user, Role::Hospital)?;
    state
        .booking
        .hospital_for_user(&user.id)
        .await?
        .ok_or_else(|| AppError::Forbidden("No hospital registered for this account".to_string()))
}

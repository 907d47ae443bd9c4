// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use schedule_cell::Rejection;
use shared_models::error::AppError;

pub use shared_models::appointment::{Appointment, AppointmentStatus, PatientInfo};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Body of `POST /appointments`. Fields are optional so that a missing field
/// is reported by name instead of as a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub service_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    pub patient_info: Option<PatientInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub date: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub patient_info: Option<PatientInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableDatesQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// ==============================================================================
// STORE BOUNDARY
// ==============================================================================

/// A validated booking ready to be written. The store assigns id, status
/// and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub service_id: Uuid,
    pub hospital_id: Uuid,
    pub patient_info: PatientInfo,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub date: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub patient_info: Option<PatientInfo>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.status.is_none() && self.patient_info.is_none()
    }
}

impl From<UpdateAppointmentRequest> for AppointmentPatch {
    fn from(request: UpdateAppointmentRequest) -> Self {
        Self {
            date: request.date,
            status: request.status,
            patient_info: request.patient_info,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Slot {date} is already booked for service {service_id}")]
    Conflict { service_id: Uuid, date: DateTime<Utc> },

    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Appointment storage error: {0}")]
    Backend(String),
}

// ==============================================================================
// BOOKING FLOW
// ==============================================================================

/// Lifecycle of a single booking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStage {
    Received,
    Validated,
    Persisted,
    Updated,
    Removed,
    Notified,
    Rejected,
}

impl BookingStage {
    pub fn can_transition_to(self, next: BookingStage) -> bool {
        use BookingStage::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Rejected)
                | (Validated, Persisted)
                | (Validated, Updated)
                | (Validated, Removed)
                | (Validated, Rejected)
                | (Persisted, Notified)
                | (Updated, Notified)
                | (Removed, Notified)
        )
    }
}

impl fmt::Display for BookingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStage::Received => "received",
            BookingStage::Validated => "validated",
            BookingStage::Persisted => "persisted",
            BookingStage::Updated => "updated",
            BookingStage::Removed => "removed",
            BookingStage::Notified => "notified",
            BookingStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Result of a successful write. `stage` stops short of `Notified` when the
/// notification could not be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub stage: BookingStage,
}

impl BookingOutcome {
    pub fn notified(&self) -> bool {
        self.stage == BookingStage::Notified
    }
}

// ==============================================================================
// ERROR MODELS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Rejected(Rejection),

    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("Appointment not found")]
    NotFound,

    #[error("Catalogue error: {0}")]
    CatalogueError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Rejected(rejection) => AppError::BadRequest(rejection.reason().to_string()),
            AppointmentError::ServiceNotFound(_) => AppError::NotFound("Service not found".to_string()),
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::CatalogueError(msg) => AppError::Internal(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

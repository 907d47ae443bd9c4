use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use schedule_cell::{Interval, Schedule, ScheduleError};

/// Hospital as published in the catalogue. `schedule` holds the default
/// weekday hours; `service_list` carries per-category schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    pub schedule: Interval,
    #[serde(default)]
    pub service_list: Vec<ServiceListEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListEntry {
    pub category: Uuid,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

/// Everything the booking flow needs to know about a service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceBookingContext {
    pub service_id: Uuid,
    pub hospital_id: Uuid,
    pub schedule: Schedule,
}

/// Seed document accepted by the in-memory catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogueSeed {
    #[serde(default)]
    pub hospitals: Vec<Hospital>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Hospital {
    /// The category schedule replaces the hospital hours outright; there is no merging.
    pub fn schedule_for_category(&self, category_id: Uuid) -> Schedule {
        self.service_list
            .iter()
            .find(|entry| entry.category == category_id)
            .and_then(|entry| entry.schedule.clone())
            .unwrap_or_else(|| Schedule::weekdays_only(self.schedule))
    }

    /// Configuration-time validation of every schedule the hospital publishes.
    pub fn validate(&self) -> Result<(), CatalogueError> {
        Schedule::weekdays_only(self.schedule)
            .validate()
            .map_err(CatalogueError::InvalidSchedule)?;
        for entry in &self.service_list {
            if let Some(schedule) = &entry.schedule {
                schedule.validate().map_err(CatalogueError::InvalidSchedule)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("Hospital not found: {0}")]
    HospitalNotFound(Uuid),

    #[error("Hospital already registered: {0}")]
    DuplicateHospital(Uuid),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error("Catalogue backend error: {0}")]
    Backend(String),
}

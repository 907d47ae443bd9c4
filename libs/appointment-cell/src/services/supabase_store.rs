use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentPatch, AppointmentStatus, NewAppointment, PatientInfo, StoreError};
use crate::services::store::AppointmentStore;

const RETURN_REPRESENTATION: &str = "return=representation";

/// Row shape of the `appointments` table (see `migrations/001_appointments.sql`).
#[derive(Debug, Serialize, Deserialize)]
struct AppointmentRow {
    id: Uuid,
    service_id: Uuid,
    hospital_id: Uuid,
    patient_info: PatientInfo,
    date: DateTime<Utc>,
    status: AppointmentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: row.id,
            service_id: row.service_id,
            hospital_id: row.hospital_id,
            patient_info: row.patient_info,
            date: row.date,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DateRow {
    date: DateTime<Utc>,
}

/// PostgREST-backed store. Slot uniqueness is enforced by the partial unique
/// index on `(service_id, date)`; PostgREST reports violations as 409.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<AppointmentRow> = self
            .supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(backend_error)?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn patch_owned(&self, id: Uuid, hospital_id: Uuid, body: Value) -> Result<Vec<AppointmentRow>, SupabaseError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&hospital_id=eq.{}&status=neq.cancelled",
            id, hospital_id
        );
        self.supabase
            .request(Method::PATCH, &path, Some(body), Some(RETURN_REPRESENTATION))
            .await
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let now = Utc::now();
        let row = AppointmentRow {
            id: Uuid::new_v4(),
            service_id: appointment.service_id,
            hospital_id: appointment.hospital_id,
            patient_info: appointment.patient_info,
            date: appointment.date,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let body = serde_json::to_value(&row).map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<AppointmentRow> = self
            .supabase
            .request(Method::POST, "/rest/v1/appointments", Some(body), Some(RETURN_REPRESENTATION))
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(_) => StoreError::Conflict {
                    service_id: appointment.service_id,
                    date: appointment.date,
                },
                other => backend_error(other),
            })?;

        let created = rows
            .into_iter()
            .next()
            .map(Appointment::from)
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))?;
        debug!("Stored appointment {} for service {}", created.id, created.service_id);
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=neq.cancelled", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn remove(&self, id: Uuid, hospital_id: Uuid) -> Result<Appointment, StoreError> {
        let body = json!({
            "status": AppointmentStatus::Cancelled,
            "updated_at": Utc::now(),
        });
        let rows = self.patch_owned(id, hospital_id, body).await.map_err(backend_error)?;

        rows.into_iter()
            .next()
            .map(Appointment::from)
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(
        &self,
        id: Uuid,
        hospital_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        let current = self
            .get(id)
            .await?
            .filter(|a| a.hospital_id == hospital_id)
            .ok_or(StoreError::NotFound(id))?;

        let mut body = Map::new();
        if let Some(date) = patch.date {
            body.insert("date".to_string(), json!(date));
        }
        if let Some(status) = patch.status {
            body.insert("status".to_string(), json!(status));
        }
        if let Some(patient_info) = &patch.patient_info {
            body.insert("patient_info".to_string(), json!(patient_info));
        }
        body.insert("updated_at".to_string(), json!(Utc::now()));

        let rows = self
            .patch_owned(id, hospital_id, Value::Object(body))
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(_) => StoreError::Conflict {
                    service_id: current.service_id,
                    date: patch.date.unwrap_or(current.date),
                },
                other => backend_error(other),
            })?;

        rows.into_iter()
            .next()
            .map(Appointment::from)
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_by_hospital(&self, hospital_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?hospital_id=eq.{}&status=neq.cancelled&order=created_at.desc",
            hospital_id
        );
        self.fetch(&path).await
    }

    async fn list_appointed_dates(&self, service_id: Uuid) -> Result<BTreeSet<DateTime<Utc>>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?service_id=eq.{}&status=neq.cancelled&select=date",
            service_id
        );
        let rows: Vec<DateRow> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend_error)?;
        Ok(rows.into_iter().map(|row| row.date).collect())
    }
}

fn backend_error(e: SupabaseError) -> StoreError {
    error!("Appointment query failed: {}", e);
    StoreError::Backend(e.to_string())
}

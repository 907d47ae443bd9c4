use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use schedule_cell::{Interval, Schedule};
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{CatalogueError, ServiceListEntry};
use crate::services::Catalogue;

#[derive(Debug, Deserialize)]
struct ServiceRow {
    hospital_id: Uuid,
    category_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct HospitalRow {
    schedule: Interval,
    #[serde(default)]
    service_list: Vec<ServiceListEntry>,
}

#[derive(Debug, Deserialize)]
struct HospitalIdRow {
    id: Uuid,
}

/// Catalogue backed by the `services` and `hospitals` PostgREST tables.
pub struct SupabaseCatalogue {
    supabase: SupabaseClient,
}

impl SupabaseCatalogue {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch_service(&self, service_id: Uuid) -> Result<ServiceRow, CatalogueError> {
        let path = format!(
            "/rest/v1/services?id=eq.{}&select=hospital_id,category_id",
            service_id
        );
        let rows: Vec<ServiceRow> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend_error)?;

        rows.into_iter()
            .next()
            .ok_or(CatalogueError::ServiceNotFound(service_id))
    }
}

#[async_trait]
impl Catalogue for SupabaseCatalogue {
    async fn service_schedule(&self, service_id: Uuid) -> Result<Schedule, CatalogueError> {
        let service = self.fetch_service(service_id).await?;

        let path = format!(
            "/rest/v1/hospitals?id=eq.{}&select=schedule,service_list",
            service.hospital_id
        );
        let rows: Vec<HospitalRow> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend_error)?;
        let hospital = rows
            .into_iter()
            .next()
            .ok_or(CatalogueError::HospitalNotFound(service.hospital_id))?;

        let schedule = hospital
            .service_list
            .into_iter()
            .find(|entry| entry.category == service.category_id)
            .and_then(|entry| entry.schedule)
            .unwrap_or_else(|| Schedule::weekdays_only(hospital.schedule));

        debug!("Resolved schedule for service {}", service_id);
        Ok(schedule)
    }

    async fn hospital_for_service(&self, service_id: Uuid) -> Result<Uuid, CatalogueError> {
        Ok(self.fetch_service(service_id).await?.hospital_id)
    }

    async fn hospital_for_user(&self, user_id: &str) -> Result<Option<Uuid>, CatalogueError> {
        let path = format!(
            "/rest/v1/hospitals?user_id=eq.{}&select=id&limit=1",
            urlencoding::encode(user_id)
        );
        let rows: Vec<HospitalIdRow> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend_error)?;

        Ok(rows.into_iter().next().map(|row| row.id))
    }
}

fn backend_error(e: SupabaseError) -> CatalogueError {
    error!("Catalogue query failed: {}", e);
    CatalogueError::Backend(e.to_string())
}

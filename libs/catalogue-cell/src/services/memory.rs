use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use schedule_cell::Schedule;

use crate::models::{CatalogueError, CatalogueSeed, Hospital, Service};
use crate::services::Catalogue;

#[derive(Default)]
struct CatalogueData {
    hospitals: HashMap<Uuid, Hospital>,
    services: HashMap<Uuid, Service>,
}

impl CatalogueData {
    fn insert_hospital(&mut self, hospital: Hospital) -> Result<(), CatalogueError> {
        hospital.validate()?;
        if self.hospitals.contains_key(&hospital.id) {
            return Err(CatalogueError::DuplicateHospital(hospital.id));
        }
        debug!("Registered hospital {} ({})", hospital.id, hospital.name);
        self.hospitals.insert(hospital.id, hospital);
        Ok(())
    }

    fn insert_service(&mut self, service: Service) -> Result<(), CatalogueError> {
        if !self.hospitals.contains_key(&service.hospital_id) {
            return Err(CatalogueError::HospitalNotFound(service.hospital_id));
        }
        debug!("Registered service {} for hospital {}", service.id, service.hospital_id);
        self.services.insert(service.id, service);
        Ok(())
    }
}

/// Process-local catalogue used by the memory backend and by tests.
#[derive(Default)]
pub struct InMemoryCatalogue {
    data: RwLock<CatalogueData>,
}

impl InMemoryCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogueSeed) -> Result<Self, CatalogueError> {
        let mut data = CatalogueData::default();
        for hospital in seed.hospitals {
            data.insert_hospital(hospital)?;
        }
        for service in seed.services {
            data.insert_service(service)?;
        }
        info!(
            "Catalogue seeded with {} hospitals and {} services",
            data.hospitals.len(),
            data.services.len()
        );
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CatalogueError::Backend(format!("cannot read {}: {}", path.display(), e)))?;
        let seed: CatalogueSeed = serde_json::from_str(&raw)
            .map_err(|e| CatalogueError::Backend(format!("invalid seed {}: {}", path.display(), e)))?;
        Self::from_seed(seed)
    }

    /// Rejects zero-width or inverted working hours before they can be stored.
    pub async fn register_hospital(&self, hospital: Hospital) -> Result<(), CatalogueError> {
        self.data.write().await.insert_hospital(hospital)
    }

    pub async fn register_service(&self, service: Service) -> Result<(), CatalogueError> {
        self.data.write().await.insert_service(service)
    }
}

#[async_trait]
impl Catalogue for InMemoryCatalogue {
    async fn service_schedule(&self, service_id: Uuid) -> Result<Schedule, CatalogueError> {
        let data = self.data.read().await;
        let service = data
            .services
            .get(&service_id)
            .ok_or(CatalogueError::ServiceNotFound(service_id))?;
        let hospital = data
            .hospitals
            .get(&service.hospital_id)
            .ok_or(CatalogueError::HospitalNotFound(service.hospital_id))?;
        Ok(hospital.schedule_for_category(service.category_id))
    }

    async fn hospital_for_service(&self, service_id: Uuid) -> Result<Uuid, CatalogueError> {
        self.data
            .read()
            .await
            .services
            .get(&service_id)
            .map(|service| service.hospital_id)
            .ok_or(CatalogueError::ServiceNotFound(service_id))
    }

    async fn hospital_for_user(&self, user_id: &str) -> Result<Option<Uuid>, CatalogueError> {
        Ok(self
            .data
            .read()
            .await
            .hospitals
            .values()
            .find(|hospital| hospital.user_id == user_id)
            .map(|hospital| hospital.id))
    }
}

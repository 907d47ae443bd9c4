use async_trait::async_trait;
use uuid::Uuid;

use schedule_cell::Schedule;

use crate::models::{CatalogueError, ServiceBookingContext};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryCatalogue;
pub use supabase::SupabaseCatalogue;

/// Read side of the hospital/service catalogue consumed by booking and realtime.
#[async_trait]
pub trait Catalogue: Send + Sync {
    async fn service_schedule(&self, service_id: Uuid) -> Result<Schedule, CatalogueError>;

    async fn hospital_for_service(&self, service_id: Uuid) -> Result<Uuid, CatalogueError>;

    /// The hospital owned by a hospital-role user, if any.
    async fn hospital_for_user(&self, user_id: &str) -> Result<Option<Uuid>, CatalogueError>;

    async fn booking_context(&self, service_id: Uuid) -> Result<ServiceBookingContext, CatalogueError> {
        let hospital_id = self.hospital_for_service(service_id).await?;
        let schedule = self.service_schedule(service_id).await?;
        Ok(ServiceBookingContext {
            service_id,
            hospital_id,
            schedule,
        })
    }
}

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use realtime_cell::{AppointmentEvent, RealtimeHub};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Outbound side of the booking flow. Delivery is best effort; the booking
/// is already stored when this is called.
#[async_trait]
pub trait AppointmentNotifier: Send + Sync {
    /// Returns how many live sessions accepted the event.
    async fn notify(&self, hospital_id: Uuid, event: AppointmentEvent) -> Result<usize, NotifyError>;
}

#[async_trait]
impl AppointmentNotifier for RealtimeHub {
    async fn notify(&self, hospital_id: Uuid, event: AppointmentEvent) -> Result<usize, NotifyError> {
        Ok(self.publish(hospital_id, event).await)
    }
}

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentPatch, AppointmentStatus, NewAppointment, StoreError};

/// Persistence boundary for appointments.
///
/// Implementations guarantee that `(service_id, date)` is unique among
/// active appointments; `create` and a date-changing `update` answer
/// `StoreError::Conflict` when the slot is held. Cancelled appointments are
/// invisible to every operation here.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Cancels an appointment owned by `hospital_id`. Someone else's
    /// appointment is reported as `NotFound`.
    async fn remove(&self, id: Uuid, hospital_id: Uuid) -> Result<Appointment, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        hospital_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError>;

    /// Newest first.
    async fn list_by_hospital(&self, hospital_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn list_appointed_dates(&self, service_id: Uuid) -> Result<BTreeSet<DateTime<Utc>>, StoreError>;
}

#[derive(Default)]
struct StoreData {
    records: HashMap<Uuid, Appointment>,
    // per service: booked date -> appointment id, active appointments only
    appointed: HashMap<Uuid, BTreeMap<DateTime<Utc>, Uuid>>,
}

impl StoreData {
    fn active_owned(&mut self, id: Uuid, hospital_id: Uuid) -> Result<&mut Appointment, StoreError> {
        self.records
            .get_mut(&id)
            .filter(|a| a.is_active() && a.hospital_id == hospital_id)
            .ok_or(StoreError::NotFound(id))
    }

    fn release(&mut self, service_id: Uuid, date: DateTime<Utc>) {
        if let Some(index) = self.appointed.get_mut(&service_id) {
            index.remove(&date);
            if index.is_empty() {
                self.appointed.remove(&service_id);
            }
        }
    }

    fn holder(&self, service_id: Uuid, date: DateTime<Utc>) -> Option<Uuid> {
        self.appointed.get(&service_id)?.get(&date).copied()
    }
}

/// Process-local store. One lock guards both the records and the
/// appointed-dates index, so the uniqueness check and the insert are a
/// single critical section.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    data: RwLock<StoreData>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let mut data = self.data.write().await;

        if data.holder(appointment.service_id, appointment.date).is_some() {
            return Err(StoreError::Conflict {
                service_id: appointment.service_id,
                date: appointment.date,
            });
        }

        let now = Utc::now();
        let record = Appointment {
            id: Uuid::new_v4(),
            service_id: appointment.service_id,
            hospital_id: appointment.hospital_id,
            patient_info: appointment.patient_info,
            date: appointment.date,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        data.appointed
            .entry(record.service_id)
            .or_default()
            .insert(record.date, record.id);
        data.records.insert(record.id, record.clone());

        debug!("Stored appointment {} for service {}", record.id, record.service_id);
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .records
            .get(&id)
            .filter(|a| a.is_active())
            .cloned())
    }

    async fn remove(&self, id: Uuid, hospital_id: Uuid) -> Result<Appointment, StoreError> {
        let mut data = self.data.write().await;

        let record = data.active_owned(id, hospital_id)?;
        record.status = AppointmentStatus::Cancelled;
        record.updated_at = Utc::now();
        let cancelled = record.clone();

        data.release(cancelled.service_id, cancelled.date);
        debug!("Cancelled appointment {}", id);
        Ok(cancelled)
    }

    async fn update(
        &self,
        id: Uuid,
        hospital_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        let mut data = self.data.write().await;

        let current = data.active_owned(id, hospital_id)?.clone();

        if let Some(date) = patch.date.filter(|date| *date != current.date) {
            if data.holder(current.service_id, date).is_some_and(|holder| holder != id) {
                return Err(StoreError::Conflict {
                    service_id: current.service_id,
                    date,
                });
            }
        }

        let mut next = current.clone();
        if let Some(date) = patch.date {
            next.date = date;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(patient_info) = patch.patient_info {
            next.patient_info = patient_info;
        }
        next.updated_at = Utc::now();

        data.release(current.service_id, current.date);
        if next.is_active() {
            data.appointed
                .entry(next.service_id)
                .or_default()
                .insert(next.date, next.id);
        }
        data.records.insert(id, next.clone());

        debug!("Updated appointment {}", id);
        Ok(next)
    }

    async fn list_by_hospital(&self, hospital_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let data = self.data.read().await;
        let mut appointments: Vec<Appointment> = data
            .records
            .values()
            .filter(|a| a.hospital_id == hospital_id && a.is_active())
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(appointments)
    }

    async fn list_appointed_dates(&self, service_id: Uuid) -> Result<BTreeSet<DateTime<Utc>>, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .appointed
            .get(&service_id)
            .map(|index| index.keys().copied().collect())
            .unwrap_or_default())
    }
}

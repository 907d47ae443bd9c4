// libs/appointment-cell/src/services/booking.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use catalogue_cell::{Catalogue, CatalogueError};
use realtime_cell::AppointmentEvent;
use schedule_cell::{AvailabilityResolver, Rejection};
use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentError, AppointmentPatch, AppointmentStatus, BookingOutcome, BookingStage,
    CreateAppointmentRequest, NewAppointment, StoreError, UpdateAppointmentRequest,
};
use crate::services::notifier::AppointmentNotifier;
use crate::services::store::AppointmentStore;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Days listed when `GET /available-dates` is called without `to`.
const DEFAULT_LISTING_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy)]
pub struct BookingSettings {
    /// Schedules are wall-clock hours at this offset.
    pub utc_offset: FixedOffset,
    pub resolver: AvailabilityResolver,
    pub max_range_days: i64,
}

impl BookingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let utc_offset = FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                config.clinic_utc_offset_minutes
            );
            Utc.fix()
        });

        Self {
            utc_offset,
            resolver: AvailabilityResolver::new(config.slot_minutes),
            max_range_days: config.max_range_days.max(1),
        }
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.utc_offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.utc_offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Tracks one request through `Received -> Validated -> Persisted -> Notified`.
struct StageTracker {
    operation: &'static str,
    stage: BookingStage,
}

impl StageTracker {
    fn start(operation: &'static str) -> Self {
        debug!("{}: {}", operation, BookingStage::Received);
        Self {
            operation,
            stage: BookingStage::Received,
        }
    }

    fn advance(&mut self, next: BookingStage) {
        if !self.stage.can_transition_to(next) {
            warn!("{}: unexpected transition {} -> {}", self.operation, self.stage, next);
        }
        debug!("{}: {} -> {}", self.operation, self.stage, next);
        self.stage = next;
    }

    fn reject(&mut self, error: AppointmentError) -> AppointmentError {
        self.advance(BookingStage::Rejected);
        info!("{} rejected: {}", self.operation, error);
        error
    }
}

/// Orchestrates validation, persistence and notification of bookings.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    catalogue: Arc<dyn Catalogue>,
    notifier: Arc<dyn AppointmentNotifier>,
    settings: BookingSettings,
    clock: Clock,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        catalogue: Arc<dyn Catalogue>,
        notifier: Arc<dyn AppointmentNotifier>,
        settings: BookingSettings,
    ) -> Self {
        Self {
            store,
            catalogue,
            notifier,
            settings,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &BookingSettings {
        &self.settings
    }

    // ==============================================================================
    // WRITES
    // ==============================================================================

    pub async fn create(&self, request: CreateAppointmentRequest) -> Result<BookingOutcome, AppointmentError> {
        let mut tracker = StageTracker::start("create appointment");

        let (service_id, date, patient_info) = match (request.service_id, request.date, request.patient_info) {
            (Some(service_id), Some(date), Some(patient_info)) if patient_info.missing_fields().is_empty() => {
                (service_id, date, patient_info)
            }
            (service_id, date, patient_info) => {
                let mut missing = Vec::new();
                if service_id.is_none() {
                    missing.push("serviceId");
                }
                if date.is_none() {
                    missing.push("date");
                }
                match &patient_info {
                    Some(info) => missing.extend(info.missing_fields()),
                    None => missing.push("patientInfo"),
                }
                return Err(tracker.reject(AppointmentError::ValidationError(format!(
                    "Missing required fields: {}",
                    missing.join(", ")
                ))));
            }
        };

        let context = self
            .catalogue
            .booking_context(service_id)
            .await
            .map_err(|e| tracker.reject(catalogue_error(e)))?;

        let booked = self
            .booked_local(service_id, None)
            .await
            .map_err(|e| tracker.reject(e))?;
        self.settings
            .resolver
            .is_bookable(&context.schedule, &booked, self.settings.to_local(date), self.now_local())
            .map_err(|rejection| tracker.reject(AppointmentError::Rejected(rejection)))?;
        tracker.advance(BookingStage::Validated);

        let appointment = self
            .store
            .create(NewAppointment {
                service_id,
                hospital_id: context.hospital_id,
                patient_info,
                date,
            })
            .await
            .map_err(|e| tracker.reject(store_error(e)))?;
        tracker.advance(BookingStage::Persisted);
        info!(
            "Appointment {} booked for service {} at {}",
            appointment.id, appointment.service_id, appointment.date
        );

        let stage = self
            .notify(&mut tracker, appointment.hospital_id, AppointmentEvent::created(appointment.clone()))
            .await;
        Ok(BookingOutcome { appointment, stage })
    }

    pub async fn update(
        &self,
        id: Uuid,
        hospital_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<BookingOutcome, AppointmentError> {
        let mut tracker = StageTracker::start("update appointment");
        let patch = AppointmentPatch::from(request);

        if patch.is_empty() {
            return Err(tracker.reject(AppointmentError::ValidationError("Nothing to update".to_string())));
        }
        if patch.status == Some(AppointmentStatus::Cancelled) {
            return Err(tracker.reject(AppointmentError::ValidationError(
                "Use DELETE to cancel an appointment".to_string(),
            )));
        }
        if let Some(missing) = patch
            .patient_info
            .as_ref()
            .map(|info| info.missing_fields())
            .filter(|missing| !missing.is_empty())
        {
            return Err(tracker.reject(AppointmentError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            ))));
        }

        let current = self
            .store
            .get(id)
            .await
            .map_err(|e| tracker.reject(store_error(e)))?
            .filter(|a| a.hospital_id == hospital_id)
            .ok_or_else(|| tracker.reject(AppointmentError::NotFound))?;

        if let Some(date) = patch.date.filter(|date| *date != current.date) {
            let schedule = self
                .catalogue
                .service_schedule(current.service_id)
                .await
                .map_err(|e| tracker.reject(catalogue_error(e)))?;
            let booked = self
                .booked_local(current.service_id, Some(current.date))
                .await
                .map_err(|e| tracker.reject(e))?;
            self.settings
                .resolver
                .is_bookable(&schedule, &booked, self.settings.to_local(date), self.now_local())
                .map_err(|rejection| tracker.reject(AppointmentError::Rejected(rejection)))?;
        }
        tracker.advance(BookingStage::Validated);

        let appointment = self
            .store
            .update(id, hospital_id, patch)
            .await
            .map_err(|e| tracker.reject(store_error(e)))?;
        tracker.advance(BookingStage::Updated);
        info!("Appointment {} updated", appointment.id);

        let stage = self
            .notify(&mut tracker, hospital_id, AppointmentEvent::updated(appointment.clone()))
            .await;
        Ok(BookingOutcome { appointment, stage })
    }

    /// Cancels the appointment. Repeating the call answers `NotFound`.
    pub async fn remove(&self, id: Uuid, hospital_id: Uuid) -> Result<BookingOutcome, AppointmentError> {
        let mut tracker = StageTracker::start("remove appointment");
        tracker.advance(BookingStage::Validated);

        let appointment = self
            .store
            .remove(id, hospital_id)
            .await
            .map_err(|e| tracker.reject(store_error(e)))?;
        tracker.advance(BookingStage::Removed);
        info!("Appointment {} cancelled by hospital {}", id, hospital_id);

        let stage = self
            .notify(&mut tracker, hospital_id, AppointmentEvent::removed(appointment.clone()))
            .await;
        Ok(BookingOutcome { appointment, stage })
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn hospital_for_user(&self, user_id: &str) -> Result<Option<Uuid>, AppointmentError> {
        self.catalogue.hospital_for_user(user_id).await.map_err(catalogue_error)
    }

    pub async fn list_by_hospital(&self, hospital_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_by_hospital(hospital_id).await.map_err(store_error)
    }

    pub async fn appointed_dates(&self, service_id: Uuid) -> Result<Vec<DateTime<Utc>>, AppointmentError> {
        self.catalogue
            .hospital_for_service(service_id)
            .await
            .map_err(catalogue_error)?;

        let dates = self
            .store
            .list_appointed_dates(service_id)
            .await
            .map_err(store_error)?;
        Ok(dates.into_iter().collect())
    }

    /// Open future slots between `from` and `to` (inclusive, clinic-local
    /// dates). The span is capped at `max_range_days`.
    pub async fn available_dates(
        &self,
        service_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateTime<Utc>>, AppointmentError> {
        let now = self.now_local();
        let from = from.unwrap_or(now.date());
        let to = match to {
            Some(to) => to,
            None => add_days(from, DEFAULT_LISTING_DAYS - 1)?,
        };
        if to < from {
            return Err(AppointmentError::ValidationError(
                "`to` must not be before `from`".to_string(),
            ));
        }
        let span = u64::try_from(self.settings.max_range_days.saturating_sub(1)).unwrap_or(0);
        let last_day = from
            .checked_add_days(Days::new(span))
            .map_or(to, |cap| to.min(cap));

        let schedule = self
            .catalogue
            .service_schedule(service_id)
            .await
            .map_err(catalogue_error)?;
        let booked = self.booked_local(service_id, None).await?;

        let range_start = from.and_time(NaiveTime::MIN).max(now);
        let range_end = add_days(last_day, 1)?.and_time(NaiveTime::MIN);

        Ok(self
            .settings
            .resolver
            .list_available_dates(&schedule, &booked, range_start, range_end)
            .filter_map(|slot| self.settings.to_utc(slot))
            .collect())
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    fn now_local(&self) -> NaiveDateTime {
        self.settings.to_local((self.clock)())
    }

    /// Booked slots of the service in clinic-local time, optionally leaving
    /// out the slot an appointment being moved currently holds.
    async fn booked_local(
        &self,
        service_id: Uuid,
        exclude: Option<DateTime<Utc>>,
    ) -> Result<BTreeSet<NaiveDateTime>, AppointmentError> {
        let dates = self
            .store
            .list_appointed_dates(service_id)
            .await
            .map_err(store_error)?;

        Ok(dates
            .into_iter()
            .filter(|date| Some(*date) != exclude)
            .map(|date| self.settings.to_local(date))
            .collect())
    }

    async fn notify(&self, tracker: &mut StageTracker, hospital_id: Uuid, event: AppointmentEvent) -> BookingStage {
        let kind = event.kind;
        match self.notifier.notify(hospital_id, event).await {
            Ok(delivered) => {
                debug!("{:?} delivered to {} sessions of hospital {}", kind, delivered, hospital_id);
                tracker.advance(BookingStage::Notified);
            }
            Err(e) => {
                // the write stands; only observability hears about it
                warn!("{:?} notification for hospital {} failed: {}", kind, hospital_id, e);
            }
        }
        tracker.stage
    }
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, AppointmentError> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| AppointmentError::ValidationError("date range out of bounds".to_string()))
}

fn catalogue_error(e: CatalogueError) -> AppointmentError {
    match e {
        CatalogueError::ServiceNotFound(id) => AppointmentError::ServiceNotFound(id),
        other => AppointmentError::CatalogueError(other.to_string()),
    }
}

fn store_error(e: StoreError) -> AppointmentError {
    match e {
        StoreError::Conflict { service_id, date } => {
            debug!("Store refused slot {} for service {}", date, service_id);
            AppointmentError::Rejected(Rejection::SlotTaken)
        }
        StoreError::NotFound(_) => AppointmentError::NotFound,
        StoreError::Backend(msg) => AppointmentError::DatabaseError(msg),
    }
}

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_models::appointment::Appointment;

use crate::models::{AppointmentEvent, AppointmentEventKind, ServerMessage};

/// What the hospital UI should do after a frame has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEffect {
    Nothing,
    Notify { appointment_id: Uuid, play_sound: bool },
}

/// Client-side mirror of a hospital's appointment board, driven by the
/// frames a realtime session receives.
#[derive(Debug, Default)]
pub struct HospitalDashboard {
    hospital_id: Option<Uuid>,
    appointments: Vec<Appointment>,
    appointed_dates: BTreeMap<Uuid, BTreeSet<DateTime<Utc>>>,
    unread: u32,
    last_error: Option<String>,
}

impl HospitalDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the board with the result of `GET /appointments`.
    pub fn load(&mut self, appointments: Vec<Appointment>) {
        self.appointed_dates.clear();
        self.appointments = appointments.into_iter().filter(Appointment::is_active).collect();
        self.appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for appointment in &self.appointments {
            self.appointed_dates
                .entry(appointment.service_id)
                .or_default()
                .insert(appointment.date);
        }
    }

    pub fn apply(&mut self, message: &ServerMessage) -> DashboardEffect {
        match message {
            ServerMessage::Joined(hospital_id) => {
                self.hospital_id = Some(*hospital_id);
                self.last_error = None;
                DashboardEffect::Nothing
            }
            ServerMessage::Error(reason) => {
                self.last_error = Some(reason.clone());
                DashboardEffect::Nothing
            }
            ServerMessage::Watch(event) => self.apply_event(event),
        }
    }

    fn apply_event(&mut self, event: &AppointmentEvent) -> DashboardEffect {
        let incoming = &event.appointment;
        if self.hospital_id.is_some_and(|id| id != incoming.hospital_id) {
            return DashboardEffect::Nothing;
        }

        match event.kind {
            AppointmentEventKind::AppointmentCreated => {
                if self.position(incoming.id).is_some() {
                    return DashboardEffect::Nothing;
                }
                self.index_date(incoming);
                self.appointments.insert(0, incoming.clone());
                self.unread += 1;
                DashboardEffect::Notify {
                    appointment_id: incoming.id,
                    play_sound: true,
                }
            }
            AppointmentEventKind::AppointmentUpdated => {
                self.remove(incoming.id);
                if incoming.is_active() {
                    self.index_date(incoming);
                    self.appointments.insert(0, incoming.clone());
                }
                DashboardEffect::Notify {
                    appointment_id: incoming.id,
                    play_sound: false,
                }
            }
            AppointmentEventKind::AppointmentRemoved => {
                self.remove(incoming.id);
                DashboardEffect::Nothing
            }
        }
    }

    fn position(&self, appointment_id: Uuid) -> Option<usize> {
        self.appointments.iter().position(|a| a.id == appointment_id)
    }

    fn index_date(&mut self, appointment: &Appointment) {
        self.appointed_dates
            .entry(appointment.service_id)
            .or_default()
            .insert(appointment.date);
    }

    fn remove(&mut self, appointment_id: Uuid) {
        let Some(index) = self.position(appointment_id) else {
            return;
        };
        let removed = self.appointments.remove(index);
        if let Some(dates) = self.appointed_dates.get_mut(&removed.service_id) {
            dates.remove(&removed.date);
        }
    }

    pub fn mark_read(&mut self) {
        self.unread = 0;
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    pub fn hospital_id(&self) -> Option<Uuid> {
        self.hospital_id
    }

    /// Newest first.
    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn appointed_dates(&self, service_id: Uuid) -> Vec<DateTime<Utc>> {
        self.appointed_dates
            .get(&service_id)
            .map(|dates| dates.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

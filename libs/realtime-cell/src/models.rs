use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::appointment::Appointment;

/// Identity of one live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentRemoved,
}

/// Payload of a `watch` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentEvent {
    #[serde(rename = "type")]
    pub kind: AppointmentEventKind,
    pub appointment: Appointment,
}

impl AppointmentEvent {
    pub fn created(appointment: Appointment) -> Self {
        Self {
            kind: AppointmentEventKind::AppointmentCreated,
            appointment,
        }
    }

    pub fn updated(appointment: Appointment) -> Self {
        Self {
            kind: AppointmentEventKind::AppointmentUpdated,
            appointment,
        }
    }

    pub fn removed(appointment: Appointment) -> Self {
        Self {
            kind: AppointmentEventKind::AppointmentRemoved,
            appointment,
        }
    }
}

/// Frames sent by hospital sessions: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Join(Uuid),
    Leave,
    /// Advisory echo of a REST booking; the server already published it.
    Appoint(AppointNotice),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointNotice {
    pub hospital_id: Uuid,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Frames pushed to hospital sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined(Uuid),
    Watch(AppointmentEvent),
    Error(String),
}

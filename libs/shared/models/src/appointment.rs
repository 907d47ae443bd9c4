use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A booked slot. `(service_id, date)` is unique among active appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub service_id: Uuid,
    pub hospital_id: Uuid,
    pub patient_info: PatientInfo,
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl PatientInfo {
    /// Name and phone are the minimum a hospital needs to reach the patient.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("patientInfo.name");
        }
        if self.phone.trim().is_empty() {
            missing.push("patientInfo.phone");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Cancelled appointments release their slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appointment_serializes_with_camel_case_fields() {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            hospital_id: Uuid::new_v4(),
            patient_info: PatientInfo {
                name: "Anna".to_string(),
                phone: "+100200300".to_string(),
                email: None,
                comment: None,
            },
            date: now,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(&appointment).unwrap();
        assert_eq!(value["serviceId"], json!(appointment.service_id));
        assert_eq!(value["patientInfo"]["name"], json!("Anna"));
        assert_eq!(value["status"], json!("pending"));
        assert!(value["patientInfo"].get("email").is_none());
    }

    #[test]
    fn blank_patient_fields_are_reported() {
        let info = PatientInfo {
            name: "  ".to_string(),
            phone: "123".to_string(),
            email: None,
            comment: None,
        };
        assert_eq!(info.missing_fields(), vec!["patientInfo.name"]);
    }

    #[test]
    fn only_cancelled_is_inactive() {
        assert!(AppointmentStatus::Pending.is_active());
        assert!(AppointmentStatus::Completed.is_active());
        assert!(!AppointmentStatus::Cancelled.is_active());
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::{
    appointment_routes, AppointmentBookingService, AppointmentState, BookingSettings, InMemoryAppointmentStore,
};
use catalogue_cell::{Hospital, InMemoryCatalogue, Service};
use realtime_cell::RealtimeHub;
use schedule_cell::Interval;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

pub struct TestHospital {
    pub id: Uuid,
    pub service_id: Uuid,
    pub owner: TestUser,
}

pub struct TestApp {
    pub router: Router,
    pub hub: RealtimeHub,
    pub secret: String,
    pub hospital_a: TestHospital,
    pub hospital_b: TestHospital,
}

/// Monday 2030-01-07 08:00 UTC; the clinic runs on UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, 8, 0, 0).unwrap()
}

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, day, hour, minute, 0).unwrap()
}

async fn register(catalogue: &InMemoryCatalogue, email: &str) -> TestHospital {
    let owner = TestUser::hospital(email);
    let id = Uuid::new_v4();
    let service_id = Uuid::new_v4();

    catalogue
        .register_hospital(Hospital {
            id,
            user_id: owner.id.clone(),
            name: email.to_string(),
            address: String::new(),
            phone: String::new(),
            schedule: Interval::new(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            ),
            service_list: Vec::new(),
        })
        .await
        .unwrap();
    catalogue
        .register_service(Service {
            id: service_id,
            hospital_id: id,
            category_id: Uuid::new_v4(),
            name: "General consultation".to_string(),
            price: 30.0,
        })
        .await
        .unwrap();

    TestHospital { id, service_id, owner }
}

pub async fn spawn_app() -> TestApp {
    let config = TestConfig::default();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    let hospital_a = register(&catalogue, "a@hospital.example").await;
    let hospital_b = register(&catalogue, "b@hospital.example").await;

    let hub = RealtimeHub::new(16);
    let booking = AppointmentBookingService::new(
        Arc::new(InMemoryAppointmentStore::new()),
        catalogue,
        Arc::new(hub.clone()),
        BookingSettings::default(),
    )
    .with_clock(Arc::new(now));

    let router = appointment_routes(AppointmentState {
        config: config.to_arc(),
        booking: Arc::new(booking),
    });

    TestApp {
        router,
        hub,
        secret: config.jwt_secret,
        hospital_a,
        hospital_b,
    }
}

impl TestApp {
    pub fn bearer(&self, user: &TestUser) -> String {
        JwtTestUtils::bearer(user, &self.secret)
    }

    pub async fn send(&self, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        send(self.router.clone(), method, uri, auth, body).await
    }
}

pub async fn send(
    router: Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

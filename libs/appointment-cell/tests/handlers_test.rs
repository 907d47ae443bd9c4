mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{at, spawn_app};
use shared_utils::test_utils::{JwtTestUtils, TestUser};

#[tokio::test]
async fn listing_requires_a_token() {
    let app = spawn_app().await;
    let (status, body) = app.send(Method::GET, "/", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let app = spawn_app().await;
    let token = JwtTestUtils::create_expired_token(&app.hospital_a.owner, &app.secret);
    let (status, _) = app
        .send(Method::GET, "/", Some(&format!("Bearer {}", token)), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn patients_cannot_list_hospital_appointments() {
    let app = spawn_app().await;
    let patient = app.bearer(&TestUser::patient("p@example.com"));
    let (status, _) = app.send(Method::GET, "/", Some(&patient), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hospital_role_without_hospital_is_forbidden() {
    let app = spawn_app().await;
    let orphan = app.bearer(&TestUser::hospital("nobody@hospital.example"));
    let (status, _) = app.send(Method::GET, "/", Some(&orphan), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listing_shows_only_own_appointments() {
    let app = spawn_app().await;
    for (service_id, hour) in [(app.hospital_a.service_id, 10), (app.hospital_b.service_id, 11)] {
        let (status, _) = app
            .send(
                Method::POST,
                "/",
                None,
                Some(json!({
                    "serviceId": service_id,
                    "date": at(8, hour, 0),
                    "patientInfo": { "name": "Ira", "phone": "555-0177" }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let owner = app.bearer(&app.hospital_a.owner);
    let (status, body) = app.send(Method::GET, "/", Some(&owner), None).await;

    assert_eq!(status, StatusCode::OK);
    let appointments = body["appointments"].as_array().unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0]["hospitalId"], json!(app.hospital_a.id));
}

#[tokio::test]
async fn missing_fields_are_a_validation_error() {
    let app = spawn_app().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/",
            None,
            Some(json!({ "serviceId": app.hospital_a.service_id })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("date"));
    assert!(message.contains("patientInfo"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = spawn_app().await;
    let (status, body) = app
        .send(Method::POST, "/", None, Some(json!({ "serviceId": "not-a-uuid" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_service_on_booking_is_bad_request() {
    let app = spawn_app().await;
    let (status, body) = app
        .send(
            Method::POST,
            "/",
            None,
            Some(json!({
                "serviceId": Uuid::new_v4(),
                "date": at(8, 10, 0),
                "patientInfo": { "name": "Ira", "phone": "555-0177" }
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown service");
}

#[tokio::test]
async fn unknown_service_dates_are_not_found() {
    let app = spawn_app().await;
    let (status, _) = app
        .send(Method::GET, &format!("/appointed-dates/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::GET, &format!("/available-dates/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_update_is_rejected() {
    let app = spawn_app().await;
    let (_, body) = app
        .send(
            Method::POST,
            "/",
            None,
            Some(json!({
                "serviceId": app.hospital_a.service_id,
                "date": at(8, 10, 0),
                "patientInfo": { "name": "Ira", "phone": "555-0177" }
            })),
        )
        .await;
    let id = body["appointment"]["id"].as_str().unwrap().to_string();

    let owner = app.bearer(&app.hospital_a.owner);
    let (status, body) = app
        .send(Method::PUT, &format!("/{}", id), Some(&owner), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Nothing to update");
}

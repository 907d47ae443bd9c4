use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use futures::{SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

use catalogue_cell::{Hospital, InMemoryCatalogue};
use realtime_cell::{realtime_routes, AppointmentEvent, RealtimeHub, RealtimeState, ServerMessage};
use schedule_cell::Interval;
use shared_models::appointment::{Appointment, AppointmentStatus, PatientInfo};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct Harness {
    addr: SocketAddr,
    hub: RealtimeHub,
    hospital_id: Uuid,
    owner: TestUser,
    secret: String,
}

async fn start() -> Harness {
    let config = TestConfig::default();
    let owner = TestUser::hospital("desk@central.example");
    let hospital_id = Uuid::new_v4();

    let catalogue = InMemoryCatalogue::new();
    catalogue
        .register_hospital(Hospital {
            id: hospital_id,
            user_id: owner.id.clone(),
            name: "Central".to_string(),
            address: String::new(),
            phone: String::new(),
            schedule: Interval::new(
                chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            ),
            service_list: Vec::new(),
        })
        .await
        .unwrap();

    let hub = RealtimeHub::new(8);
    let app = realtime_routes(RealtimeState {
        config: config.to_arc(),
        hub: hub.clone(),
        catalogue: Arc::new(catalogue),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Harness {
        addr,
        hub,
        hospital_id,
        owner,
        secret: config.jwt_secret,
    }
}

fn appointment(hospital_id: Uuid) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        hospital_id,
        patient_info: PatientInfo {
            name: "Ada".to_string(),
            phone: "555-0101".to_string(),
            email: None,
            comment: None,
        },
        date: Utc.with_ymd_and_hms(2030, 1, 7, 9, 0, 0).unwrap(),
        status: AppointmentStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

async fn next_frame<S>(stream: &mut S) -> ServerMessage
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("websocket error");
    match frame {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("unexpected frame {:?}", other),
    }
}

#[tokio::test]
async fn joined_session_receives_watch_events() {
    let harness = start().await;
    let token = JwtTestUtils::create_test_token(&harness.owner, &harness.secret, None);
    let url = format!("ws://{}/ws?token={}", harness.addr, token);

    let (socket, _) = connect_async(url).await.unwrap();
    let (mut sink, mut stream) = socket.split();

    sink.send(Message::Text(
        json!({ "event": "join", "data": harness.hospital_id }).to_string().into(),
    ))
    .await
    .unwrap();
    assert_eq!(next_frame(&mut stream).await, ServerMessage::Joined(harness.hospital_id));

    let booked = appointment(harness.hospital_id);
    let delivered = harness
        .hub
        .publish(harness.hospital_id, AppointmentEvent::created(booked.clone()))
        .await;
    assert_eq!(delivered, 1);

    assert_matches!(
        next_frame(&mut stream).await,
        ServerMessage::Watch(event) if event.appointment.id == booked.id
    );
}

#[tokio::test]
async fn joining_another_hospital_is_refused() {
    let harness = start().await;
    let token = JwtTestUtils::create_test_token(&harness.owner, &harness.secret, None);
    let (socket, _) = connect_async(format!("ws://{}/ws?token={}", harness.addr, token))
        .await
        .unwrap();
    let (mut sink, mut stream) = socket.split();

    let foreign = Uuid::new_v4();
    sink.send(Message::Text(json!({ "event": "join", "data": foreign }).to_string().into()))
        .await
        .unwrap();

    assert_matches!(next_frame(&mut stream).await, ServerMessage::Error(_));
    assert_eq!(harness.hub.subscriber_count(foreign).await, 0);
}

#[tokio::test]
async fn patient_token_cannot_upgrade() {
    let harness = start().await;
    let patient = TestUser::patient("someone@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &harness.secret, None);

    let result = connect_async(format!("ws://{}/ws?token={}", harness.addr, token)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn missing_token_cannot_upgrade() {
    let harness = start().await;
    let result = connect_async(format!("ws://{}/ws", harness.addr)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn closing_the_socket_unregisters_the_session() {
    let harness = start().await;
    let token = JwtTestUtils::create_test_token(&harness.owner, &harness.secret, None);
    let (mut socket, _) = connect_async(format!("ws://{}/ws?token={}", harness.addr, token))
        .await
        .unwrap();

    socket
        .send(Message::Text(
            json!({ "event": "join", "data": harness.hospital_id }).to_string().into(),
        ))
        .await
        .unwrap();
    assert_eq!(next_frame(&mut socket).await, ServerMessage::Joined(harness.hospital_id));
    assert_eq!(harness.hub.active_sessions().await, 1);

    socket.close(None).await.unwrap();

    for _ in 0..50 {
        if harness.hub.active_sessions().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session was not unregistered");
}

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_utils::extractor::{bearer_token, require_role};
use shared_utils::jwt::validate_token;

use crate::models::{ClientMessage, ServerMessage, SessionId};
use crate::router::RealtimeState;
use crate::services::RealtimeHub;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// Upgrades a hospital user's connection to the realtime channel.
///
/// Browsers cannot set headers on a websocket handshake, so the JWT may come
/// in `?token=`; an `Authorization: Bearer` header is accepted as well.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<RealtimeState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = match query.token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => bearer_token(&headers)?,
    };

    let user = validate_token(token, &state.config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;
    require_role(&user, Role::Hospital)?;

    let hospital_id = state
        .catalogue
        .hospital_for_user(&user.id)
        .await
        .map_err(|e| {
            error!("Failed to resolve hospital for user {}: {}", user.id, e);
            AppError::Internal(e.to_string())
        })?
        .ok_or_else(|| AppError::Forbidden("No hospital registered for this account".to_string()))?;

    info!("Realtime upgrade accepted for hospital {}", hospital_id);
    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, hospital_id)))
}

async fn handle_socket(socket: WebSocket, hub: RealtimeHub, owned_hospital: Uuid) {
    let (mut sink, mut stream) = socket.split();
    let (session_id, mut outbound) = hub.connect().await;

    // The hub owns the only sender; disconnecting it ends this task.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize realtime frame: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_client_frame(&hub, session_id, owned_hospital, text.as_str()).await {
                    if let Err(e) = hub.send_to(session_id, reply).await {
                        debug!("Could not reply to session {}: {}", session_id, e);
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    hub.disconnect(session_id).await;
    let _ = writer.await;
    info!("Realtime session {} closed", session_id);
}

/// Applies one inbound frame and returns the reply for the session, if any.
pub async fn handle_client_frame(
    hub: &RealtimeHub,
    session_id: SessionId,
    owned_hospital: Uuid,
    raw: &str,
) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(message) => message,
        Err(e) => {
            debug!("Session {} sent an unrecognised frame: {}", session_id, e);
            return Some(ServerMessage::Error("Unrecognised message".to_string()));
        }
    };

    match message {
        ClientMessage::Join(hospital_id) if hospital_id != owned_hospital => {
            warn!(
                "Session {} tried to join hospital {} it does not own",
                session_id, hospital_id
            );
            Some(ServerMessage::Error("Cannot join another hospital's channel".to_string()))
        }
        ClientMessage::Join(hospital_id) => match hub.subscribe(session_id, hospital_id).await {
            Ok(()) => Some(ServerMessage::Joined(hospital_id)),
            Err(e) => {
                error!("Join failed for session {}: {}", session_id, e);
                Some(ServerMessage::Error("Join failed".to_string()))
            }
        },
        ClientMessage::Leave => {
            hub.unsubscribe(session_id).await;
            None
        }
        ClientMessage::Appoint(notice) => {
            // Bookings are published by the server when they are stored.
            debug!(
                "Session {} echoed an appointment for hospital {}",
                session_id, notice.hospital_id
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn join_own_hospital_is_acknowledged() {
        let hub = RealtimeHub::new(4);
        let hospital_id = Uuid::new_v4();
        let (session, _rx) = hub.connect().await;

        let frame = json!({ "event": "join", "data": hospital_id }).to_string();
        let reply = handle_client_frame(&hub, session, hospital_id, &frame).await;

        assert_eq!(reply, Some(ServerMessage::Joined(hospital_id)));
        assert_eq!(hub.subscriber_count(hospital_id).await, 1);
    }

    #[tokio::test]
    async fn join_foreign_hospital_is_refused() {
        let hub = RealtimeHub::new(4);
        let (own, foreign) = (Uuid::new_v4(), Uuid::new_v4());
        let (session, _rx) = hub.connect().await;

        let frame = json!({ "event": "join", "data": foreign }).to_string();
        let reply = handle_client_frame(&hub, session, own, &frame).await;

        assert!(matches!(reply, Some(ServerMessage::Error(_))));
        assert_eq!(hub.subscriber_count(foreign).await, 0);
    }

    #[tokio::test]
    async fn leave_and_appoint_produce_no_reply() {
        let hub = RealtimeHub::new(4);
        let hospital_id = Uuid::new_v4();
        let (session, _rx) = hub.connect().await;
        hub.subscribe(session, hospital_id).await.unwrap();

        let appoint = json!({
            "event": "appoint",
            "data": { "hospitalId": hospital_id, "data": {} }
        })
        .to_string();
        assert_eq!(handle_client_frame(&hub, session, hospital_id, &appoint).await, None);
        assert_eq!(hub.subscriber_count(hospital_id).await, 1);

        assert_eq!(handle_client_frame(&hub, session, hospital_id, r#"{"event":"leave"}"#).await, None);
        assert_eq!(hub.subscriber_count(hospital_id).await, 0);
    }

    #[tokio::test]
    async fn garbage_frame_gets_error_reply() {
        let hub = RealtimeHub::new(4);
        let (session, _rx) = hub.connect().await;
        let reply = handle_client_frame(&hub, session, Uuid::new_v4(), "not json").await;
        assert!(matches!(reply, Some(ServerMessage::Error(_))));
    }
}

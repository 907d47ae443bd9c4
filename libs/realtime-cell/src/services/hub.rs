use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RealtimeError;
use crate::models::{AppointmentEvent, ServerMessage, SessionId};

pub type SessionSender = mpsc::Sender<ServerMessage>;
pub type SessionReceiver = mpsc::Receiver<ServerMessage>;

struct SessionEntry {
    sender: SessionSender,
    hospital: Option<Uuid>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, SessionEntry>,
    channels: HashMap<Uuid, HashSet<SessionId>>,
}

impl Registry {
    fn leave_channel(&mut self, session_id: SessionId) -> Option<Uuid> {
        let hospital_id = self.sessions.get_mut(&session_id)?.hospital.take()?;
        if let Some(members) = self.channels.get_mut(&hospital_id) {
            members.remove(&session_id);
            if members.is_empty() {
                self.channels.remove(&hospital_id);
            }
        }
        Some(hospital_id)
    }

    fn drop_session(&mut self, session_id: SessionId) -> bool {
        self.leave_channel(session_id);
        self.sessions.remove(&session_id).is_some()
    }
}

/// Fan-out of appointment events to hospital sessions.
///
/// Every session owns a bounded queue. Publishing never blocks: a session
/// whose queue is full misses that event, and a session whose receiver is
/// gone is dropped from the registry. Neither affects other sessions.
#[derive(Clone)]
pub struct RealtimeHub {
    registry: Arc<RwLock<Registry>>,
    session_buffer: usize,
}

impl RealtimeHub {
    pub fn new(session_buffer: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            session_buffer: session_buffer.max(1),
        }
    }

    /// Registers a new session and returns the receiving half of its queue.
    pub async fn connect(&self) -> (SessionId, SessionReceiver) {
        let (sender, receiver) = mpsc::channel(self.session_buffer);
        let session_id = SessionId::new();

        self.registry.write().await.sessions.insert(
            session_id,
            SessionEntry {
                sender,
                hospital: None,
            },
        );

        debug!("Realtime session {} connected", session_id);
        (session_id, receiver)
    }

    /// Binds the session to a hospital channel, leaving any previous one.
    pub async fn subscribe(&self, session_id: SessionId, hospital_id: Uuid) -> Result<(), RealtimeError> {
        let mut registry = self.registry.write().await;
        if !registry.sessions.contains_key(&session_id) {
            return Err(RealtimeError::UnknownSession(session_id));
        }

        if let Some(previous) = registry.leave_channel(session_id) {
            debug!("Session {} left hospital channel {}", session_id, previous);
        }
        if let Some(entry) = registry.sessions.get_mut(&session_id) {
            entry.hospital = Some(hospital_id);
        }
        registry.channels.entry(hospital_id).or_default().insert(session_id);

        info!("Session {} joined hospital channel {}", session_id, hospital_id);
        Ok(())
    }

    pub async fn unsubscribe(&self, session_id: SessionId) -> Option<Uuid> {
        let left = self.registry.write().await.leave_channel(session_id);
        if let Some(hospital_id) = left {
            debug!("Session {} left hospital channel {}", session_id, hospital_id);
        }
        left
    }

    pub async fn disconnect(&self, session_id: SessionId) {
        if self.registry.write().await.drop_session(session_id) {
            debug!("Realtime session {} disconnected", session_id);
        }
    }

    /// Delivers a `watch` frame to every session bound to the hospital and
    /// returns how many sessions accepted it.
    pub async fn publish(&self, hospital_id: Uuid, event: AppointmentEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let registry = self.registry.read().await;
            let Some(members) = registry.channels.get(&hospital_id) else {
                debug!("No sessions watching hospital {}", hospital_id);
                return 0;
            };

            for session_id in members {
                let Some(entry) = registry.sessions.get(session_id) else {
                    continue;
                };
                match entry.sender.try_send(ServerMessage::Watch(event.clone())) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("Session {} is lagging, dropped {:?} event", session_id, event.kind);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*session_id),
                }
            }
        }

        if !closed.is_empty() {
            let mut registry = self.registry.write().await;
            for session_id in closed {
                registry.drop_session(session_id);
                debug!("Pruned closed session {}", session_id);
            }
        }

        debug!(
            "Published {:?} for hospital {} to {} sessions",
            event.kind, hospital_id, delivered
        );
        delivered
    }

    /// Direct reply to one session (join acknowledgements, errors).
    pub async fn send_to(&self, session_id: SessionId, message: ServerMessage) -> Result<(), RealtimeError> {
        let sender = {
            let registry = self.registry.read().await;
            registry
                .sessions
                .get(&session_id)
                .map(|entry| entry.sender.clone())
                .ok_or(RealtimeError::UnknownSession(session_id))?
        };

        sender
            .send(message)
            .await
            .map_err(|_| RealtimeError::SessionClosed(session_id))
    }

    pub async fn hospital_of(&self, session_id: SessionId) -> Option<Uuid> {
        self.registry
            .read()
            .await
            .sessions
            .get(&session_id)
            .and_then(|entry| entry.hospital)
    }

    pub async fn active_sessions(&self) -> usize {
        self.registry.read().await.sessions.len()
    }

    pub async fn subscriber_count(&self, hospital_id: Uuid) -> usize {
        self.registry
            .read()
            .await
            .channels
            .get(&hospital_id)
            .map_or(0, HashSet::len)
    }

    /// Drops every session; their writers observe a closed queue and exit.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.write().await;
        let count = registry.sessions.len();
        registry.sessions.clear();
        registry.channels.clear();
        info!("Realtime hub shut down, closed {} sessions", count);
    }
}

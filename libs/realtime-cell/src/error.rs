use thiserror::Error;

use crate::models::SessionId;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Session {0} is not allowed to join hospital channel {1}")]
    JoinForbidden(SessionId, uuid::Uuid),

    #[error("Session queue closed: {0}")]
    SessionClosed(SessionId),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

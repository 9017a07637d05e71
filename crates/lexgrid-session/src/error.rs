//! Error types for the session layer.

use lexgrid_protocol::PlayerId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The session id presented on rejoin was never issued, or its
    /// session has already been cleaned up.
    #[error("unknown session")]
    UnknownSession,

    /// The rejoin grace period has elapsed.
    #[error("session expired for player {0}")]
    SessionExpired(PlayerId),

    /// The session is still attached to a live connection.
    #[error("player {0} already has an active connection")]
    AlreadyConnected(PlayerId),

    /// The username presented on rejoin differs from the one on record.
    #[error("username does not match session for player {0}")]
    UsernameMismatch(PlayerId),
}

impl SessionError {
    /// The code reported to the client in an `error` event.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::UnknownSession | Self::SessionExpired(_) => 404,
            Self::AlreadyConnected(_) => 409,
            Self::UsernameMismatch(_) => 400,
        }
    }
}

//! Error types for the room layer.

use lexgrid_protocol::{PlayerId, RoomCode};

/// Errors returned by room registry operations.
///
/// Guard failures inside a running match (starting without everyone
/// ready, toggling readiness mid-round) are not errors: those requests
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room is at capacity.
    #[error("room {0} is full")]
    Full(RoomCode),

    /// The room is mid-match and not accepting players.
    #[error("room {0} has a match in progress")]
    MatchInProgress(RoomCode),

    /// The player is already seated in a room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The player is not in the room the operation refers to.
    #[error("player {0} is not in a room")]
    NotInRoom(PlayerId),

    /// Display name empty or too long.
    #[error("invalid player name: {0:?}")]
    InvalidName(String),
}

impl RoomError {
    /// Status code sent to the client in an `error` event.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::NotInRoom(_) => 404,
            Self::Full(_) | Self::MatchInProgress(_) | Self::AlreadyInRoom(..) => 409,
            Self::InvalidName(_) => 400,
        }
    }
}

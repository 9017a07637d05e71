//! Session types: the server's record of one player's identity.
//!
//! A session tracks:
//! - WHO the player is (`PlayerId`, display name once known)
//! - WHAT state the connection is in (connected, disconnected, expired)
//! - HOW the player can come back (`SessionId`)
//! - HOW many matches the player has won (crowns)

use std::time::{Duration, Instant};

use lexgrid_protocol::{PlayerId, SessionId};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player may take to rejoin before the
    /// session expires.
    ///
    /// Default: 120 seconds. Zero disables rejoin entirely.
    pub reconnect_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(120),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The current state of a player's session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
///       ↑                            │
///       └──────────(rejoin)──────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Attached to a live connection.
    Connected,

    /// Connection dropped at `since`. Rejoin allowed until
    /// `since + reconnect_grace`.
    Disconnected { since: Instant },

    /// Grace period elapsed. Waiting for cleanup.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single player's session on the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,

    /// Handed to the client in `session:welcome`. A 32-character hex
    /// string (128 bits of randomness), so it doubles as a rejoin secret.
    pub session_id: SessionId,

    /// Display name, set once the player creates or joins a room. Rejoin
    /// requires the same name.
    pub username: Option<String>,

    pub state: SessionState,

    /// Matches won by this player.
    pub crowns: u32,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }
}

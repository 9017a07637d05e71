//! The session manager: tracks every player session on the server.
//!
//! Responsibilities:
//! - Issuing a fresh identity for each new connection
//! - Tracking which players are connected or disconnected
//! - Resolving rejoin requests (session id + username, within grace)
//! - Expiring and cleaning up abandoned sessions
//! - Counting crowns
//!
//! # Concurrency note
//!
//! `SessionManager` uses plain `HashMap`s and is owned by the single engine
//! task, so it needs no locking of its own. Every method that depends on
//! time takes `now` explicitly.

use std::collections::HashMap;
use std::time::Instant;

use lexgrid_protocol::{PlayerId, SessionId};
use rand::Rng;

use crate::{CrownService, Session, SessionConfig, SessionError, SessionState};

/// Manages all player sessions.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ disconnect() ──→ reconnect() ──→ [Connected]
///                   │
///                   ▼ (grace elapsed)
///             expire_stale() ──→ [Expired] ──→ cleanup_expired()
/// ```
pub struct SessionManager {
    /// All sessions, keyed by player ID.
    sessions: HashMap<PlayerId, Session>,

    /// Index from session ID to player ID, kept in sync with `sessions`.
    by_session_id: HashMap<SessionId, PlayerId>,

    next_player_id: u64,

    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new, empty session manager with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            by_session_id: HashMap::new(),
            next_player_id: 1,
            config,
        }
    }

    /// Issues a new identity for a freshly accepted connection.
    pub fn create(&mut self) -> &Session {
        let player_id = PlayerId(self.next_player_id);
        self.next_player_id += 1;

        let session_id = generate_session_id();
        self.by_session_id.insert(session_id.clone(), player_id);

        tracing::info!(%player_id, "session created");

        self.sessions.entry(player_id).or_insert(Session {
            player_id,
            session_id,
            username: None,
            state: SessionState::Connected,
            crowns: 0,
        })
    }

    /// Records the display name a player chose when entering a room.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player has no session.
    pub fn set_username(
        &mut self,
        player_id: PlayerId,
        username: &str,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        session.username = Some(username.to_string());
        Ok(())
    }

    /// Marks a player as disconnected and starts the grace period.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no session exists.
    pub fn disconnect(&mut self, player_id: PlayerId, now: Instant) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;

        session.state = SessionState::Disconnected { since: now };

        tracing::info!(%player_id, "player disconnected, grace period started");
        Ok(())
    }

    /// Reattaches a disconnected session to a new connection.
    ///
    /// # Errors
    /// - [`SessionError::UnknownSession`]: session id not recognized
    /// - [`SessionError::UsernameMismatch`]: wrong username
    /// - [`SessionError::AlreadyConnected`]: the old connection is alive
    /// - [`SessionError::SessionExpired`]: grace period elapsed
    pub fn reconnect(
        &mut self,
        session_id: &SessionId,
        username: &str,
        now: Instant,
    ) -> Result<&Session, SessionError> {
        let player_id = self
            .by_session_id
            .get(session_id)
            .copied()
            .ok_or(SessionError::UnknownSession)?;

        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::UnknownSession)?;

        if session.username.as_deref() != Some(username) {
            return Err(SessionError::UsernameMismatch(player_id));
        }

        match session.state {
            SessionState::Disconnected { since } => {
                if now.saturating_duration_since(since) > self.config.reconnect_grace {
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(player_id));
                }
                session.state = SessionState::Connected;
                tracing::info!(%player_id, "player rejoined");
                Ok(session)
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(player_id)),
            SessionState::Expired => Err(SessionError::SessionExpired(player_id)),
        }
    }

    /// Drops a session outright.
    ///
    /// Used for the throwaway identity a connection received before it
    /// rejoined as someone else.
    pub fn discard(&mut self, player_id: PlayerId) -> Option<Session> {
        let session = self.sessions.remove(&player_id)?;
        self.by_session_id.remove(&session.session_id);
        Some(session)
    }

    /// Expires every disconnected session past its grace period.
    ///
    /// Returns the player IDs that were expired, so higher layers can
    /// remove those players from their rooms.
    pub fn expire_stale(&mut self, now: Instant) -> Vec<PlayerId> {
        let grace = self.config.reconnect_grace;
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = session.state {
                if now.saturating_duration_since(since) > grace {
                    session.state = SessionState::Expired;
                    expired.push(session.player_id);
                    tracing::info!(
                        player_id = %session.player_id,
                        "session expired (grace period elapsed)"
                    );
                }
            }
        }

        expired
    }

    /// Removes all expired sessions. Returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.sessions.len();
        let by_session_id = &mut self.by_session_id;
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                by_session_id.remove(&session.session_id);
                false
            } else {
                true
            }
        });
        before - self.sessions.len()
    }

    /// Looks up a session by player ID.
    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Crowns won so far by `player_id` (0 for unknown players).
    pub fn crowns(&self, player_id: &PlayerId) -> u32 {
        self.sessions.get(player_id).map_or(0, |s| s.crowns)
    }

    /// Returns the number of sessions (any state).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl CrownService for SessionManager {
    fn get_session(&self, session_id: &SessionId) -> Option<&Session> {
        let player_id = self.by_session_id.get(session_id)?;
        self.sessions.get(player_id)
    }

    fn award_crown(&mut self, winner: PlayerId) -> Result<u32, SessionError> {
        let session = self
            .sessions
            .get_mut(&winner)
            .ok_or(SessionError::NotFound(winner))?;
        session.crowns += 1;
        tracing::info!(player_id = %winner, crowns = session.crowns, "crown awarded");
        Ok(session.crowns)
    }
}

/// Generates a random 32-character hex session id (128 bits of entropy).
fn generate_session_id() -> SessionId {
    let bytes: [u8; 16] = rand::rng().random();
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

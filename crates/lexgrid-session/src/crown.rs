//! The session/crown collaborator used by the match engine.
//!
//! The engine only needs two things from the session layer: look up a
//! session, and credit a match winner. Keeping that behind a trait lets
//! tests (and a future persistent store) stand in for [`SessionManager`].
//!
//! [`SessionManager`]: crate::SessionManager

use lexgrid_protocol::{PlayerId, SessionId};

use crate::{Session, SessionError};

/// Looks up sessions and awards match wins.
pub trait CrownService {
    /// Returns the session with the given id, if it still exists.
    fn get_session(&self, session_id: &SessionId) -> Option<&Session>;

    /// Credits one crown to `winner`. Returns the new crown count.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the player has no session any more.
    fn award_crown(&mut self, winner: PlayerId) -> Result<u32, SessionError>;
}

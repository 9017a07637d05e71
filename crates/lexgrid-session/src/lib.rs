//! Player session management for Lexgrid.
//!
//! Identity is ephemeral: every new connection gets a fresh [`PlayerId`]
//! and a random [`SessionId`]. The session id is the only thing a client
//! needs to reclaim its player after a dropped connection:
//!
//! 1. **Session tracking**: who is connected ([`SessionManager`])
//! 2. **Rejoin**: session id + username, within a grace period
//! 3. **Crowns**: per-session match wins ([`CrownService`])
//!
//! ```text
//! Room registry (above)  ← keyed by PlayerId, unaware of connections
//!     ↕
//! Session layer (this crate)  ← maps connections to PlayerIds
//!     ↕
//! Protocol layer (below)  ← PlayerId, SessionId
//! ```
//!
//! [`PlayerId`]: lexgrid_protocol::PlayerId
//! [`SessionId`]: lexgrid_protocol::SessionId

mod crown;
mod error;
mod manager;
mod session;

pub use crown::CrownService;
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};

//! Unified error type for the Lexgrid server.

use lexgrid_protocol::ProtocolError;
use lexgrid_room::RoomError;
use lexgrid_session::SessionError;
use lexgrid_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LexgridError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Rejoin or session bookkeeping failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room operation was refused.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The engine task is gone; no further events can be processed.
    #[error("engine stopped")]
    EngineStopped,

    /// The word list could not be read.
    #[error("failed to load word list {path}: {source}")]
    WordList {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

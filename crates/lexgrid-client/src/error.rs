//! Error types for client-side reconciliation.

use lexgrid_board::{BoardError, Checksum};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// A server payload's board does not hash to the checksum it carries.
    #[error("payload checksum mismatch: carried {carried}, computed {computed}")]
    ChecksumMismatch { carried: Checksum, computed: Checksum },

    /// A diff arrived before any board.
    #[error("no board yet")]
    NoBoard,

    /// A diff could not be applied to the local board.
    #[error(transparent)]
    Board(#[from] BoardError),
}

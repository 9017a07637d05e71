//! Client-side board reconciliation for Lexgrid.
//!
//! A client mirrors the server's board from three kinds of message:
//!
//! - `match:started` and `board:resync` carry a whole board plus its
//!   checksum. The mirror is replaced when it is behind or has drifted.
//! - `game:tile-changes` carries one diff with a sequence number. Diffs are
//!   applied strictly in order; early ones wait in a bounded buffer.
//!
//! Drawing is delegated to a [`Renderer`]. When the drawn board stops
//! matching the mirror, a [`RecoveryLadder`] escalates through cheaper to
//! more drastic repairs.
//!
//! ```text
//! ServerEvent → ClientSync → Board mirror → Renderer
//!                   ↓                          ↑
//!           ClientEvent queue          RecoveryLadder
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod recovery;
mod renderer;
mod sync;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::ClientError;
pub use recovery::{LadderConfig, LadderState, RecoveryAttempt, RecoveryLadder, Rung};
pub use renderer::Renderer;
pub use sync::{ClientSync, ClientSyncConfig, DiffOutcome, ResyncOutcome};

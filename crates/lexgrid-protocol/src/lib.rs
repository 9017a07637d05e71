//! Wire protocol for Lexgrid.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): one enum per
//!   direction, each variant one named event on the wire.
//! - **Types** ([`PlayerId`], [`RoomCode`], [`MatchStatus`],
//!   [`MatchSettings`], ...): identities, the match lifecycle, and the
//!   room views embedded in events.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent / ServerEvent) → Room registry
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod events;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{BoardResync, ClientEvent, MatchStarted, ServerEvent, TileChangeBatch};
pub use types::{
    Difficulty, MatchSettings, MatchStatus, PlayerId, PlayerView, RoomCode,
    RoomView, ScoreEntry, SessionId, SyncType,
};

/// Version sent in `session:welcome`. Bumped on breaking wire changes.
pub const PROTOCOL_VERSION: u32 = 1;

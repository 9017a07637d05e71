//! Room registry and match state machine for Lexgrid.
//!
//! One [`RoomRegistry`] owns every room, every room timer and every
//! queued outbound event. It is plain synchronous code: callers pass in
//! the current instant, fire due timers with [`RoomRegistry::advance`],
//! and drain [`Emit`]s to deliver.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: create/join/leave, match lifecycle, word play
//! - [`Room`]: players, settings and match state of one room
//! - [`SyncHealth`]: adaptive resync scheduling and retry backoff
//! - [`Dictionary`]: which words count and what they score
//! - [`RoomConfig`], [`SyncConfig`]: server-wide settings

mod broadcast;
mod config;
mod dictionary;
mod error;
mod machine;
mod outbox;
mod play;
mod registry;
mod room;
mod sync;

pub use broadcast::{SyncError, verify_event};
pub use config::{RoomConfig, SyncConfig};
pub use dictionary::{AnyWord, Dictionary, WordList, length_bonus};
pub use error::RoomError;
pub use outbox::{Emit, Outbox};
pub use registry::{LeaveOutcome, RoomRegistry, RoomTimer, TimerKey};
pub use room::{MatchState, Player, PlayerStats, Room};
pub use sync::{ActivityTier, RetryDecision, RetryPolicy, SyncHealth};

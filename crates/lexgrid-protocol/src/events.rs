//! Typed wire events.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}`.
//! `#[serde(tag = "event", content = "data")]` gives us exactly that shape
//! ("adjacently tagged" in serde terms), and `rename_all_fields` turns the
//! snake_case Rust fields of every variant into camelCase on the wire.
//!
//! Events without a payload serialize without `data`:
//! `{"event": "match:go"}`.

use lexgrid_board::{Board, Checksum, Position, TileChanges};
use serde::{Deserialize, Serialize};

use crate::{
    MatchSettings, PlayerId, RoomCode, RoomView, ScoreEntry, SessionId,
    SyncType,
};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// Anything that fails to decode into this enum is dropped by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Create a room and become its host.
    #[serde(rename = "room:create")]
    CreateRoom {
        player_name: String,
        #[serde(default)]
        settings: MatchSettings,
    },

    /// Join an existing room by code.
    #[serde(rename = "room:join")]
    JoinRoom {
        room_code: RoomCode,
        player_name: String,
    },

    #[serde(rename = "room:leave")]
    LeaveRoom,

    #[serde(rename = "room:set-ready")]
    SetReady { is_ready: bool },

    /// Host only. Ignored unless every connected player is ready.
    #[serde(rename = "room:start-match")]
    StartMatch,

    /// Reclaim a previous identity after a dropped connection.
    #[serde(rename = "player:reconnect")]
    Reconnect {
        session_id: SessionId,
        username: String,
    },

    /// A word traced over adjacent tiles.
    #[serde(rename = "word:submit")]
    SubmitWord { word: String, tiles: Vec<Position> },

    /// Ask for a fresh full board after detecting drift.
    #[serde(rename = "board:request-resync")]
    RequestResync,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Board payload sent once per round when play begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStarted {
    pub board: Board,
    pub board_checksum: Checksum,
    /// Whole seconds left in the round.
    pub time_remaining: u32,
    pub current_round: u8,
    pub total_rounds: u8,
    pub player_count: usize,
    /// Last diff sequence number already reflected in `board`.
    pub sequence_number: u64,
}

/// A full board snapshot that replaces whatever the client has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardResync {
    pub board: Board,
    pub board_checksum: Checksum,
    pub time_remaining: u32,
    /// Last diff sequence number already reflected in `board`.
    pub sequence_number: u64,
    /// Strictly increasing per room. Older snapshots are stale.
    pub sync_id: u64,
    pub sync_type: SyncType,
}

/// One incremental board update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileChangeBatch {
    /// Strictly increasing per room, starting at 1.
    pub sequence_number: u64,
    #[serde(flatten)]
    pub changes: TileChanges,
    /// Milliseconds since the server started.
    pub timestamp: u64,
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// First frame on every connection.
    #[serde(rename = "session:welcome")]
    Welcome {
        player_id: PlayerId,
        session_id: SessionId,
        protocol_version: u32,
    },

    #[serde(rename = "room:joined")]
    RoomJoined { room: RoomView, player_id: PlayerId },

    #[serde(rename = "room:updated")]
    RoomUpdated { room: RoomView },

    #[serde(rename = "room:left")]
    RoomLeft { room_code: RoomCode },

    /// Pre-round countdown began. `countdown` is in whole seconds.
    #[serde(rename = "match:starting")]
    MatchStarting { countdown: u32 },

    #[serde(rename = "match:go")]
    MatchGo,

    #[serde(rename = "match:started")]
    MatchStarted(MatchStarted),

    #[serde(rename = "board:resync")]
    BoardResync(BoardResync),

    #[serde(rename = "game:tile-changes")]
    TileChanges(TileChangeBatch),

    #[serde(rename = "match:timer-update")]
    TimerUpdate { time_remaining: u32 },

    #[serde(rename = "match:round-end")]
    RoundEnd {
        round_number: u8,
        scores: Vec<ScoreEntry>,
        is_match_complete: bool,
    },

    #[serde(rename = "match:finished")]
    MatchFinished {
        winner: Option<PlayerId>,
        final_scores: Vec<ScoreEntry>,
        total_rounds: u8,
    },

    #[serde(rename = "word:accepted")]
    WordAccepted {
        player_id: PlayerId,
        word: String,
        points: u32,
    },

    /// Only sent to the submitting player.
    #[serde(rename = "word:rejected")]
    WordRejected { word: String, reason: String },

    /// Request-level failure (unknown room, room full, ...).
    #[serde(rename = "error")]
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "session:welcome",
            Self::RoomJoined { .. } => "room:joined",
            Self::RoomUpdated { .. } => "room:updated",
            Self::RoomLeft { .. } => "room:left",
            Self::MatchStarting { .. } => "match:starting",
            Self::MatchGo => "match:go",
            Self::MatchStarted(_) => "match:started",
            Self::BoardResync(_) => "board:resync",
            Self::TileChanges(_) => "game:tile-changes",
            Self::TimerUpdate { .. } => "match:timer-update",
            Self::RoundEnd { .. } => "match:round-end",
            Self::MatchFinished { .. } => "match:finished",
            Self::WordAccepted { .. } => "word:accepted",
            Self::WordRejected { .. } => "word:rejected",
            Self::Error { .. } => "error",
        }
    }
}

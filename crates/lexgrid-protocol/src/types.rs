//! Core protocol types: identities, room codes, match settings and the
//! read-only views of a room that travel to clients.
//!
//! Every type here is serialized as JSON with camelCase field names, so the
//! struct definitions double as the wire schema.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over `u64` so a player id can never be passed where some other
/// number is expected. `#[serde(transparent)]` keeps it a bare number on the
/// wire: `PlayerId(42)` is just `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The opaque string a client keeps so it can rejoin after a disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomCode
// ---------------------------------------------------------------------------

/// A short, human-shareable room code such as `"K7RQP"`.
///
/// Codes use an alphabet without the characters people confuse when
/// reading a code aloud or off a screen (`I`, `L`, `O`, `0`, `1`).
///
/// Deserialization goes through [`RoomCode::parse`] (via
/// `#[serde(try_from = "String")]`), so a malformed code is rejected while
/// decoding the event instead of reaching the room registry. Lowercase
/// input is accepted and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Characters a room code may contain.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

    /// Length of every room code.
    pub const LEN: usize = 5;

    /// Validates and normalizes a user-supplied code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] if the code has the wrong
    /// length or contains a character outside [`Self::ALPHABET`].
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = code.len() == Self::LEN
            && code.bytes().all(|b| Self::ALPHABET.contains(&b));
        if !valid {
            return Err(ProtocolError::InvalidRoomCode(raw.to_string()));
        }
        Ok(Self(code))
    }

    /// Draws a random code. Uniqueness is the caller's job.
    pub fn random(rng: &mut impl Rng) -> Self {
        let code = (0..Self::LEN)
            .map(|_| {
                let idx = rng.random_range(0..Self::ALPHABET.len());
                Self::ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MatchStatus: the match lifecycle state machine
// ---------------------------------------------------------------------------

/// Where a room is in its match lifecycle.
///
/// ```text
/// lobby ──start──→ starting ──countdown──→ active ──clock──→ round-end
///   ↑                  ↑                                        │
///   │                  └──────────(rounds remain)───────────────┤
///   └──(results delay)── finished ←──────(last round)───────────┘
/// ```
///
/// [`can_transition_to`](Self::can_transition_to) is the complete table;
/// the room registry refuses any other move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Lobby,
    Starting,
    Active,
    RoundEnd,
    Finished,
}

impl MatchStatus {
    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Lobby, Self::Starting)
                | (Self::Starting, Self::Active)
                | (Self::Active, Self::RoundEnd)
                | (Self::RoundEnd, Self::Starting)
                | (Self::RoundEnd, Self::Finished)
                | (Self::Finished, Self::Lobby)
        )
    }

    /// Only lobbies accept new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// `true` from the first countdown until results are shown.
    pub fn is_in_match(self) -> bool {
        matches!(self, Self::Starting | Self::Active | Self::RoundEnd)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "lobby",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::RoundEnd => "round-end",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Match settings
// ---------------------------------------------------------------------------

/// Word difficulty. The dictionary uses it to scale word scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// Host-chosen settings for a match.
///
/// Missing fields fall back to [`Default`], so `{}` is a valid settings
/// object. Always pass client-supplied settings through
/// [`validated`](Self::validated) before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchSettings {
    /// Number of rounds in the match.
    pub rounds: u8,
    /// Length of each round in seconds.
    pub round_duration_secs: u32,
    pub difficulty: Difficulty,
}

impl MatchSettings {
    /// Round lengths a host may pick, in seconds.
    pub const ALLOWED_DURATIONS: [u32; 5] = [30, 60, 90, 120, 180];
    /// Used whenever the requested round length is not allowed.
    pub const DEFAULT_DURATION_SECS: u32 = 60;
    pub const MAX_ROUNDS: u8 = 10;

    /// Clamps every field into its legal range.
    ///
    /// - `round_duration_secs` not in [`Self::ALLOWED_DURATIONS`] becomes
    ///   [`Self::DEFAULT_DURATION_SECS`].
    /// - `rounds` is clamped to `1..=MAX_ROUNDS`.
    pub fn validated(mut self) -> Self {
        if !Self::ALLOWED_DURATIONS.contains(&self.round_duration_secs) {
            tracing::warn!(
                requested = self.round_duration_secs,
                fallback = Self::DEFAULT_DURATION_SECS,
                "round duration not allowed, using default"
            );
            self.round_duration_secs = Self::DEFAULT_DURATION_SECS;
        }
        let rounds = self.rounds.clamp(1, Self::MAX_ROUNDS);
        if rounds != self.rounds {
            tracing::warn!(requested = self.rounds, rounds, "round count clamped");
            self.rounds = rounds;
        }
        self
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            rounds: 3,
            round_duration_secs: Self::DEFAULT_DURATION_SECS,
            difficulty: Difficulty::Normal,
        }
    }
}

/// Which occasion produced a full board resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncType {
    /// Scheduled refresh during an active round, or a client request.
    Periodic,
    /// The player rejoined mid-round.
    Rejoin,
    /// The player rejoined during a pre-round countdown.
    RejoinCountdown,
}

// ---------------------------------------------------------------------------
// Room views
// ---------------------------------------------------------------------------

/// What other players can see about one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_connected: bool,
    pub score: u32,
}

/// Snapshot of a room sent on join and whenever the lobby changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub players: Vec<PlayerView>,
    pub capacity: usize,
    pub status: MatchStatus,
    pub settings: MatchSettings,
    pub current_round: u8,
}

/// One line of a scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub round_score: u32,
    pub words_found: u32,
    pub longest_word: Option<String>,
    pub best_word: Option<String>,
    pub best_word_points: u32,
}

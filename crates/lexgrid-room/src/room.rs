//! A single room: its players, settings and match state.
//!
//! `Room` is plain data plus small queries. Everything that changes a room
//! in response to an event or timer lives on
//! [`RoomRegistry`](crate::RoomRegistry), which owns every room.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use lexgrid_board::{Board, BoardGenerator};
use lexgrid_protocol::{
    MatchSettings, MatchStatus, PlayerId, PlayerView, RoomCode, RoomView, ScoreEntry,
};
use tracing::warn;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Per-match word statistics for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub words_found: u32,
    pub longest_word: Option<String>,
    pub best_word: Option<String>,
    pub best_word_points: u32,
}

impl PlayerStats {
    pub(crate) fn record(&mut self, word: &str, points: u32) {
        self.words_found += 1;
        let longer = self
            .longest_word
            .as_ref()
            .is_none_or(|w| word.chars().count() > w.chars().count());
        if longer {
            self.longest_word = Some(word.to_string());
        }
        if self.best_word.is_none() || points > self.best_word_points {
            self.best_word = Some(word.to_string());
            self.best_word_points = points;
        }
    }
}

/// A seat in a room.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
    pub is_connected: bool,
    /// Cumulative score for the current match.
    pub score: u32,
    pub round_score: u32,
    pub stats: PlayerStats,
    /// Uppercase words this player already scored this round.
    pub(crate) found_this_round: HashSet<String>,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            is_ready: false,
            is_connected: true,
            score: 0,
            round_score: 0,
            stats: PlayerStats::default(),
            found_this_round: HashSet::new(),
        }
    }

    pub(crate) fn reset_match(&mut self) {
        self.score = 0;
        self.stats = PlayerStats::default();
        self.reset_round();
    }

    pub(crate) fn reset_round(&mut self) {
        self.round_score = 0;
        self.found_this_round.clear();
    }
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// Everything about the match that changes while it runs.
#[derive(Debug, Clone)]
pub struct MatchState {
    pub(crate) status: MatchStatus,
    pub(crate) current_round: u8,
    /// The board being played. `None` outside a round.
    pub(crate) board: Option<Board>,
    /// The board the next round will start with, generated ahead of the
    /// countdown so a player rejoining mid-countdown can be sent it.
    pub(crate) upcoming_board: Option<Board>,
    pub(crate) round_started_at: Option<Instant>,
    pub(crate) countdown_ends_at: Option<Instant>,
    /// Whole seconds last sent in a timer update.
    pub(crate) last_broadcast_secs: Option<u32>,
    /// Last diff sequence number issued. Never reset.
    pub(crate) diff_seq: u64,
    /// Last full resync id issued. Never reset.
    pub(crate) sync_id: u64,
}

impl MatchState {
    fn new() -> Self {
        Self {
            status: MatchStatus::Lobby,
            current_round: 0,
            board: None,
            upcoming_board: None,
            round_started_at: None,
            countdown_ends_at: None,
            last_broadcast_secs: None,
            diff_seq: 0,
            sync_id: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Room {
    pub(crate) code: RoomCode,
    pub(crate) host: PlayerId,
    /// In join order. Host promotion and tie-breaks follow this order.
    pub(crate) players: Vec<Player>,
    pub(crate) capacity: usize,
    pub(crate) settings: MatchSettings,
    pub(crate) state: MatchState,
    pub(crate) last_activity: Instant,
    pub(crate) generator: BoardGenerator,
    /// Last honoured client resync request per player.
    pub(crate) resync_requests: HashMap<PlayerId, Instant>,
}

impl Room {
    pub(crate) fn new(
        code: RoomCode,
        host: Player,
        capacity: usize,
        settings: MatchSettings,
        generator: BoardGenerator,
        now: Instant,
    ) -> Self {
        Self {
            code,
            host: host.id,
            players: vec![host],
            capacity,
            settings,
            state: MatchState::new(),
            last_activity: now,
            generator,
            resync_requests: HashMap::new(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host(&self) -> PlayerId {
        self.host
    }

    pub fn status(&self) -> MatchStatus {
        self.state.status
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn current_round(&self) -> u8 {
        self.state.current_round
    }

    pub fn board(&self) -> Option<&Board> {
        self.state.board.as_ref()
    }

    pub fn upcoming_board(&self) -> Option<&Board> {
        self.state.upcoming_board.as_ref()
    }

    pub fn diff_seq(&self) -> u64 {
        self.state.diff_seq
    }

    pub fn sync_id(&self) -> u64 {
        self.state.sync_id
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_activity = self.last_activity.max(now);
    }

    pub fn connected_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().filter(|p| p.is_connected).map(|p| p.id)
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_connected).count()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity
    }

    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.settings.round_duration_secs))
    }

    /// When the current round's clock reaches zero.
    pub fn round_ends_at(&self) -> Option<Instant> {
        self.state
            .round_started_at
            .map(|start| start + self.round_duration())
    }

    /// Whole seconds left in the round, rounded up, never below zero.
    ///
    /// Outside an active round this is the full round length.
    pub fn time_remaining(&self, now: Instant) -> u32 {
        let Some(start) = self.state.round_started_at else {
            return self.settings.round_duration_secs;
        };
        let elapsed = now.saturating_duration_since(start);
        let remaining = self.round_duration().saturating_sub(elapsed);
        ceil_secs(remaining)
    }

    /// Whole seconds left in the pre-round countdown, rounded up.
    pub fn countdown_remaining(&self, now: Instant) -> u32 {
        self.state
            .countdown_ends_at
            .map_or(0, |end| ceil_secs(end.saturating_duration_since(now)))
    }

    /// Moves the match to `target` if the lifecycle allows it.
    ///
    /// This is the only place `status` is written.
    pub(crate) fn set_status(&mut self, target: MatchStatus) -> bool {
        let current = self.state.status;
        if !current.can_transition_to(target) {
            warn!(room = %self.code, from = %current, to = %target, "refusing status transition");
            return false;
        }
        self.state.status = target;
        true
    }

    pub fn view(&self) -> RoomView {
        RoomView {
            code: self.code.clone(),
            host_id: self.host,
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    is_host: p.id == self.host,
                    is_ready: p.is_ready,
                    is_connected: p.is_connected,
                    score: p.score,
                })
                .collect(),
            capacity: self.capacity,
            status: self.state.status,
            settings: self.settings.clone(),
            current_round: self.state.current_round,
        }
    }

    /// Scoreboard, highest score first. Equal scores keep room order.
    pub fn scores(&self) -> Vec<ScoreEntry> {
        let mut scores: Vec<ScoreEntry> = self
            .players
            .iter()
            .map(|p| ScoreEntry {
                player_id: p.id,
                name: p.name.clone(),
                score: p.score,
                round_score: p.round_score,
                words_found: p.stats.words_found,
                longest_word: p.stats.longest_word.clone(),
                best_word: p.stats.best_word.clone(),
                best_word_points: p.stats.best_word_points,
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        scores
    }

    /// Highest cumulative score. Ties go to whoever joined first.
    pub fn winner(&self) -> Option<PlayerId> {
        self.players
            .iter()
            .fold(None::<&Player>, |best, p| match best {
                Some(b) if b.score >= p.score => Some(b),
                _ => Some(p),
            })
            .map(|p| p.id)
    }
}

fn ceil_secs(d: Duration) -> u32 {
    let secs = d.as_millis().div_ceil(1000);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

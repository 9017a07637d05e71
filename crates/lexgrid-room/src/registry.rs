//! The room registry: every room, who is in which one, and every pending
//! room timer.
//!
//! All operations take the current instant instead of reading a clock, so
//! a whole match can be driven from a test by calling [`advance`] with
//! made-up times.
//!
//! [`advance`]: RoomRegistry::advance

use std::collections::HashMap;
use std::time::{Duration, Instant};

use lexgrid_board::BoardGenerator;
use lexgrid_protocol::{MatchSettings, MatchStatus, PlayerId, RoomCode, RoomView, ServerEvent};
use lexgrid_timer::TimerWheel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::{
    ActivityTier, Dictionary, Emit, Outbox, Player, Room, RoomConfig, RoomError, SyncConfig,
    SyncHealth,
};

// ---------------------------------------------------------------------------
// Timer keys
// ---------------------------------------------------------------------------

/// Per-room scheduled work. At most one of each kind is pending per room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomTimer {
    /// Pre-round countdown finished.
    Countdown,
    /// Round clock tick.
    RoundClock,
    /// Start the next round after the round-end pause.
    NextRound,
    /// Leave the results screen.
    ReturnToLobby,
    /// Periodic full board resync.
    Resync,
    /// Log sync health.
    HealthCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Idle room eviction.
    Sweep,
    Room(RoomCode, RoomTimer),
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

/// Result of a successful leave.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    /// The room lives on without the player.
    Left(RoomView),
    /// The player was the last one; the room is gone.
    RoomDeleted(RoomCode),
}

/// Owns every room and drives their matches.
pub struct RoomRegistry {
    pub(crate) rooms: HashMap<RoomCode, Room>,
    /// A player is in at most one room.
    pub(crate) player_rooms: HashMap<PlayerId, RoomCode>,
    pub(crate) timers: TimerWheel<TimerKey>,
    pub(crate) health: HashMap<RoomCode, SyncHealth>,
    pub(crate) outbox: Outbox,
    pub(crate) config: RoomConfig,
    pub(crate) sync_config: SyncConfig,
    pub(crate) dictionary: Box<dyn Dictionary>,
    rng: StdRng,
    /// Origin of diff timestamps.
    pub(crate) started_at: Instant,
}

impl RoomRegistry {
    pub fn new(
        config: RoomConfig,
        sync_config: SyncConfig,
        dictionary: Box<dyn Dictionary>,
        now: Instant,
    ) -> Self {
        Self::with_rng(config, sync_config, dictionary, StdRng::from_os_rng(), now)
    }

    /// Like [`new`](Self::new) with reproducible room codes and boards.
    pub fn with_seed(
        config: RoomConfig,
        sync_config: SyncConfig,
        dictionary: Box<dyn Dictionary>,
        seed: u64,
        now: Instant,
    ) -> Self {
        Self::with_rng(config, sync_config, dictionary, StdRng::seed_from_u64(seed), now)
    }

    fn with_rng(
        config: RoomConfig,
        sync_config: SyncConfig,
        dictionary: Box<dyn Dictionary>,
        rng: StdRng,
        now: Instant,
    ) -> Self {
        let config = config.validated();
        let mut timers = TimerWheel::new();
        timers.schedule_in(TimerKey::Sweep, now, config.sweep_interval);
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            timers,
            health: HashMap::new(),
            outbox: Outbox::new(),
            config,
            sync_config: sync_config.validated(),
            dictionary,
            rng,
            started_at: now,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn sync_config(&self) -> &SyncConfig {
        &self.sync_config
    }

    // -- Queries ----------------------------------------------------------

    pub fn room(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn room_by_player(&self, player: PlayerId) -> Option<&Room> {
        self.player_rooms
            .get(&player)
            .and_then(|code| self.rooms.get(code))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn health(&self, code: &RoomCode) -> Option<&SyncHealth> {
        self.health.get(code)
    }

    /// Tier the room's next resync interval will use.
    pub fn activity_tier(&self, code: &RoomCode, now: Instant) -> Option<ActivityTier> {
        self.health
            .get(code)
            .map(|h| h.select_tier(now, &self.sync_config))
    }

    /// When the given room timer will fire, if it is pending.
    pub fn timer_deadline(&self, code: &RoomCode, timer: RoomTimer) -> Option<Instant> {
        self.timers.deadline(&TimerKey::Room(code.clone(), timer))
    }

    /// Earliest pending deadline across all rooms.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Takes every event queued since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<Emit> {
        self.outbox.drain()
    }

    // -- Lobby ------------------------------------------------------------

    /// Creates a room with `host` as its only player.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`] or [`RoomError::AlreadyInRoom`].
    pub fn create_room(
        &mut self,
        host: PlayerId,
        host_name: &str,
        settings: MatchSettings,
        now: Instant,
    ) -> Result<RoomView, RoomError> {
        let name = self.validate_name(host_name)?;
        if let Some(current) = self.player_rooms.get(&host) {
            return Err(RoomError::AlreadyInRoom(host, current.clone()));
        }

        let code = loop {
            let code = RoomCode::random(&mut self.rng);
            if !self.rooms.contains_key(&code) {
                break code;
            }
        };
        let generator = BoardGenerator::seeded(self.rng.random());
        let room = Room::new(
            code.clone(),
            Player::new(host, name),
            self.config.capacity,
            settings.validated(),
            generator,
            now,
        );
        let view = room.view();
        self.rooms.insert(code.clone(), room);
        self.player_rooms.insert(host, code.clone());
        info!(room = %code, host = %host, "room created");

        self.outbox.to_player(
            host,
            ServerEvent::RoomJoined {
                room: view.clone(),
                player_id: host,
            },
        );
        Ok(view)
    }

    /// Seats `player` in the room with `code`.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`], [`RoomError::AlreadyInRoom`],
    /// [`RoomError::NotFound`], [`RoomError::MatchInProgress`] or
    /// [`RoomError::Full`].
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        player: PlayerId,
        name: &str,
        now: Instant,
    ) -> Result<RoomView, RoomError> {
        let name = self.validate_name(name)?;
        if let Some(current) = self.player_rooms.get(&player) {
            return Err(RoomError::AlreadyInRoom(player, current.clone()));
        }
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        if !room.status().is_joinable() {
            return Err(RoomError::MatchInProgress(code.clone()));
        }
        if room.is_full() {
            return Err(RoomError::Full(code.clone()));
        }

        room.players.push(Player::new(player, name));
        room.touch(now);
        self.player_rooms.insert(player, code.clone());
        info!(room = %code, player_id = %player, players = room.players.len(), "player joined");

        let view = room.view();
        self.outbox.to_player(
            player,
            ServerEvent::RoomJoined {
                room: view.clone(),
                player_id: player,
            },
        );
        self.outbox
            .to_room_except(room, player, ServerEvent::RoomUpdated { room: view.clone() });
        Ok(view)
    }

    /// Removes `player` from the room with `code`.
    ///
    /// The next player in join order becomes host if the host leaves. The
    /// last player out deletes the room and cancels all of its timers.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if the player is not in that room.
    pub fn leave_room(
        &mut self,
        code: &RoomCode,
        player: PlayerId,
        now: Instant,
    ) -> Result<LeaveOutcome, RoomError> {
        if self.player_rooms.get(&player) != Some(code) {
            return Err(RoomError::NotInRoom(player));
        }
        self.player_rooms.remove(&player);
        let Some(room) = self.rooms.get_mut(code) else {
            return Err(RoomError::NotFound(code.clone()));
        };

        let was_connected = room.player(player).is_some_and(|p| p.is_connected);
        room.players.retain(|p| p.id != player);
        room.resync_requests.remove(&player);
        room.touch(now);
        info!(room = %code, player_id = %player, "player left");

        if was_connected {
            self.outbox.to_player(
                player,
                ServerEvent::RoomLeft {
                    room_code: code.clone(),
                },
            );
        }

        if room.players.is_empty() {
            self.remove_room(code);
            return Ok(LeaveOutcome::RoomDeleted(code.clone()));
        }

        if room.host == player {
            room.host = room.players[0].id;
            info!(room = %code, host = %room.host, "host promoted");
        }
        let view = room.view();
        self.outbox
            .to_room(room, ServerEvent::RoomUpdated { room: view.clone() });
        Ok(LeaveOutcome::Left(view))
    }

    /// Toggles readiness. Ignored outside the lobby.
    ///
    /// Returns `true` if the flag was applied.
    pub fn set_ready(&mut self, player: PlayerId, is_ready: bool, now: Instant) -> bool {
        let Some(room) = self.player_rooms.get(&player).and_then(|c| self.rooms.get_mut(c)) else {
            return false;
        };
        if room.status() != MatchStatus::Lobby {
            debug!(room = %room.code, player_id = %player, "ready toggle outside lobby ignored");
            return false;
        }
        let Some(seat) = room.player_mut(player) else {
            return false;
        };
        seat.is_ready = is_ready;
        room.touch(now);
        let view = room.view();
        self.outbox.to_room(room, ServerEvent::RoomUpdated { room: view });
        true
    }

    // -- Connection state -------------------------------------------------

    /// Marks `player` disconnected. Their seat, score and host role stay.
    ///
    /// Returns `true` if the player was seated in a room.
    pub fn disconnect(&mut self, player: PlayerId, now: Instant) -> bool {
        let Some(room) = self.player_rooms.get(&player).and_then(|c| self.rooms.get_mut(c)) else {
            return false;
        };
        let Some(seat) = room.player_mut(player) else {
            return false;
        };
        seat.is_connected = false;
        room.touch(now);
        info!(room = %room.code, player_id = %player, "player disconnected");
        let view = room.view();
        self.outbox.to_room(room, ServerEvent::RoomUpdated { room: view });
        true
    }

    // -- Eviction ---------------------------------------------------------

    /// Evicts every room idle for at least `idle_timeout`. Returns how many
    /// were removed.
    pub fn sweep_idle(&mut self, now: Instant) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let stale: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| now.saturating_duration_since(room.last_activity) >= idle_timeout)
            .map(|room| room.code.clone())
            .collect();
        for code in &stale {
            info!(room = %code, "evicting idle room");
            if let Some(room) = self.rooms.get(code) {
                self.outbox.to_room(
                    room,
                    ServerEvent::RoomLeft {
                        room_code: code.clone(),
                    },
                );
            }
            self.remove_room(code);
        }
        stale.len()
    }

    /// Drops a room with all of its timers, mappings and health state.
    pub(crate) fn remove_room(&mut self, code: &RoomCode) {
        if self.rooms.remove(code).is_none() {
            return;
        }
        self.player_rooms.retain(|_, c| c != code);
        self.health.remove(code);
        let cancelled = self
            .timers
            .cancel_where(|key| matches!(key, TimerKey::Room(c, _) if c == code));
        info!(room = %code, cancelled, "room removed");
    }

    // -- Timers -----------------------------------------------------------

    /// Fires every timer due at `now`.
    pub fn advance(&mut self, now: Instant) {
        while let Some(key) = self.timers.pop_due(now) {
            match key {
                TimerKey::Sweep => {
                    self.sweep_idle(now);
                    self.timers
                        .schedule_in(TimerKey::Sweep, now, self.config.sweep_interval);
                }
                TimerKey::Room(code, timer) => self.fire(&code, timer, now),
            }
        }
    }

    pub(crate) fn schedule(&mut self, code: &RoomCode, timer: RoomTimer, at: Instant) {
        self.timers.schedule(TimerKey::Room(code.clone(), timer), at);
    }

    pub(crate) fn schedule_in(&mut self, code: &RoomCode, timer: RoomTimer, now: Instant, delay: Duration) {
        self.schedule(code, timer, now + delay);
    }

    pub(crate) fn cancel(&mut self, code: &RoomCode, timer: RoomTimer) {
        self.timers.cancel(&TimerKey::Room(code.clone(), timer));
    }

    // -- Helpers ----------------------------------------------------------

    fn validate_name(&self, raw: &str) -> Result<String, RoomError> {
        let name = raw.trim();
        let len = name.chars().count();
        if len == 0 || len > self.config.max_name_len {
            return Err(RoomError::InvalidName(raw.to_string()));
        }
        Ok(name.to_string())
    }
}

//! Match lifecycle: start, countdown, round clock, round end, results.
//!
//! Every timer handler looks the room up again and checks its status
//! before acting. A timer that outlived its room, or that fires after the
//! room moved on, does nothing.

use std::time::Instant;

use lexgrid_protocol::{MatchStarted, MatchStatus, PlayerId, RoomCode, ServerEvent};
use tracing::{debug, error, info, warn};

use crate::broadcast::verify_event;
use crate::{RoomRegistry, RoomTimer, SyncHealth};

/// Below this many seconds the clock is broadcast on every tick.
const FINAL_SECONDS: u32 = 10;

impl RoomRegistry {
    /// Host asks to start. Returns `false` (and changes nothing) unless the
    /// caller hosts a lobby where at least `min_players` are connected and
    /// every connected player is ready.
    pub fn start_match(&mut self, player: PlayerId, now: Instant) -> bool {
        let Some(code) = self.player_rooms.get(&player).cloned() else {
            return false;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return false;
        };
        if room.host != player || room.status() != MatchStatus::Lobby {
            debug!(room = %code, player_id = %player, "start ignored: not host or not in lobby");
            return false;
        }
        let connected = room.connected_count();
        let all_ready = room
            .players
            .iter()
            .filter(|p| p.is_connected)
            .all(|p| p.is_ready);
        if connected < self.config.min_players || !all_ready {
            debug!(room = %code, connected, all_ready, "start ignored: players not ready");
            return false;
        }

        for p in &mut room.players {
            p.reset_match();
        }
        room.state.current_round = 0;
        let board = room
            .generator
            .generate(self.config.board_width, self.config.board_height);
        room.state.upcoming_board = Some(board);
        room.touch(now);
        info!(
            room = %code,
            players = connected,
            rounds = room.settings.rounds,
            round_secs = room.settings.round_duration_secs,
            "match starting"
        );
        self.begin_round(&code, now);
        true
    }

    /// `lobby | round-end -> starting`: countdown for the next round.
    fn begin_round(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        let from_lobby = room.status() == MatchStatus::Lobby;
        if !room.set_status(MatchStatus::Starting) {
            return;
        }
        room.state.current_round += 1;
        if room.state.current_round > 1 || room.state.upcoming_board.is_none() {
            let board = room
                .generator
                .generate(self.config.board_width, self.config.board_height);
            room.state.upcoming_board = Some(board);
        }
        for p in &mut room.players {
            p.reset_round();
        }
        room.state.round_started_at = None;
        room.state.countdown_ends_at = Some(now + self.config.countdown);
        let countdown = room.countdown_remaining(now);
        debug!(room = %code, round = room.state.current_round, countdown, "round countdown");

        if from_lobby {
            let view = room.view();
            self.outbox.to_room(room, ServerEvent::RoomUpdated { room: view });
        }
        self.outbox
            .to_room(room, ServerEvent::MatchStarting { countdown });

        if self.config.countdown.is_zero() {
            self.activate_round(code, now);
        } else {
            self.schedule_in(code, RoomTimer::Countdown, now, self.config.countdown);
        }
    }

    /// `starting -> active`: hand out the board and start the clock.
    fn activate_round(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        if room.status() != MatchStatus::Starting || !room.set_status(MatchStatus::Active) {
            return;
        }
        let board = match room.state.upcoming_board.take() {
            Some(board) => board,
            None => room
                .generator
                .generate(self.config.board_width, self.config.board_height),
        };
        room.state.round_started_at = Some(now);
        room.state.countdown_ends_at = None;
        let time_remaining = room.time_remaining(now);
        room.state.last_broadcast_secs = Some(time_remaining);

        let board_checksum = board.checksum();
        let started = ServerEvent::MatchStarted(MatchStarted {
            board_checksum: board_checksum.clone(),
            board: board.clone(),
            time_remaining,
            current_round: room.state.current_round,
            total_rounds: room.settings.rounds,
            player_count: room.players.len(),
            sequence_number: room.state.diff_seq,
        });
        room.state.board = Some(board);
        info!(
            room = %code,
            round = room.state.current_round,
            of = room.settings.rounds,
            "round started"
        );

        let mut health = SyncHealth::new(now);
        let checked = Instant::now();
        match verify_event(&started, &board_checksum) {
            Ok(()) => health.record_success(checked.elapsed()),
            Err(e) => {
                error!(room = %code, error = %e, "match start payload failed verification");
                health.record_failure(&self.sync_config.retry);
            }
        }

        self.outbox.to_room(room, ServerEvent::MatchGo);
        self.outbox.to_room(room, started);

        let ends_at = now + room.round_duration();
        let next_tick = (now + self.config.clock_tick).min(ends_at);
        let resync_in = health.next_interval(now, &self.sync_config);
        self.health.insert(code.clone(), health);
        self.schedule(code, RoomTimer::RoundClock, next_tick);
        self.schedule_in(code, RoomTimer::Resync, now, resync_in);
        self.schedule_in(
            code,
            RoomTimer::HealthCheck,
            now,
            self.sync_config.health_check_interval,
        );
    }

    /// Round clock tick. Broadcasts the remaining seconds when they change,
    /// every tick near the end, and ends the round at zero.
    fn on_round_clock(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        if room.status() != MatchStatus::Active {
            return;
        }
        let (Some(ends_at), remaining) = (room.round_ends_at(), room.time_remaining(now)) else {
            return;
        };
        if remaining == 0 {
            self.end_round(code, now);
            return;
        }
        if room.state.last_broadcast_secs != Some(remaining) || remaining <= FINAL_SECONDS {
            room.state.last_broadcast_secs = Some(remaining);
            self.outbox.to_room(
                room,
                ServerEvent::TimerUpdate {
                    time_remaining: remaining,
                },
            );
        }
        let next_tick = (now + self.config.clock_tick).min(ends_at);
        self.schedule(code, RoomTimer::RoundClock, next_tick);
    }

    /// `active -> round-end`. Runs at most once per round.
    fn end_round(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        if !room.set_status(MatchStatus::RoundEnd) {
            return;
        }
        if room.state.last_broadcast_secs != Some(0) {
            room.state.last_broadcast_secs = Some(0);
            self.outbox
                .to_room(room, ServerEvent::TimerUpdate { time_remaining: 0 });
        }
        room.state.round_started_at = None;
        room.touch(now);

        let round_number = room.state.current_round;
        let is_match_complete = round_number >= room.settings.rounds;
        info!(room = %code, round = round_number, is_match_complete, "round ended");
        self.outbox.to_room(
            room,
            ServerEvent::RoundEnd {
                round_number,
                scores: room.scores(),
                is_match_complete,
            },
        );

        self.cancel(code, RoomTimer::RoundClock);
        self.cancel(code, RoomTimer::Resync);
        self.cancel(code, RoomTimer::HealthCheck);
        self.health.remove(code);

        if is_match_complete {
            self.finish_match(code, now);
        } else {
            self.schedule_in(code, RoomTimer::NextRound, now, self.config.round_end_delay);
        }
    }

    /// `round-end -> finished`: announce the winner and show results.
    fn finish_match(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        if !room.set_status(MatchStatus::Finished) {
            return;
        }
        let winner = room.winner();
        info!(room = %code, winner = ?winner, "match finished");
        self.outbox.to_room(
            room,
            ServerEvent::MatchFinished {
                winner,
                final_scores: room.scores(),
                total_rounds: room.settings.rounds,
            },
        );
        self.schedule_in(code, RoomTimer::ReturnToLobby, now, self.config.results_delay);
    }

    /// `finished -> lobby`: clear readiness and the board.
    fn return_to_lobby(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        if room.status() != MatchStatus::Finished || !room.set_status(MatchStatus::Lobby) {
            return;
        }
        for p in &mut room.players {
            p.is_ready = false;
        }
        room.state.board = None;
        room.state.upcoming_board = None;
        room.state.current_round = 0;
        room.state.last_broadcast_secs = None;
        room.touch(now);
        debug!(room = %code, "back to lobby");
        let view = room.view();
        self.outbox.to_room(room, ServerEvent::RoomUpdated { room: view });
        for timer in [
            RoomTimer::Countdown,
            RoomTimer::RoundClock,
            RoomTimer::NextRound,
            RoomTimer::Resync,
            RoomTimer::HealthCheck,
        ] {
            self.cancel(code, timer);
        }
    }

    fn log_health(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        if room.status() != MatchStatus::Active {
            return;
        }
        let Some(health) = self.health.get(code) else {
            return;
        };
        let tier = health.select_tier(now, &self.sync_config);
        let success_rate = health.success_rate();
        if health.is_degraded() {
            warn!(
                room = %code,
                %tier,
                success_rate,
                failures = health.total_failures(),
                "board sync degraded"
            );
        } else {
            debug!(
                room = %code,
                %tier,
                success_rate,
                syncs = health.total_syncs(),
                latency = ?health.average_latency(),
                "board sync health"
            );
        }
        self.schedule_in(
            code,
            RoomTimer::HealthCheck,
            now,
            self.sync_config.health_check_interval,
        );
    }

    pub(crate) fn fire(&mut self, code: &RoomCode, timer: RoomTimer, now: Instant) {
        match timer {
            RoomTimer::Countdown => self.activate_round(code, now),
            RoomTimer::RoundClock => self.on_round_clock(code, now),
            RoomTimer::NextRound => {
                if self.room(code).map(|r| r.status()) == Some(MatchStatus::RoundEnd) {
                    self.begin_round(code, now);
                }
            }
            RoomTimer::ReturnToLobby => self.return_to_lobby(code, now),
            RoomTimer::Resync => self.perform_periodic_sync(code, now),
            RoomTimer::HealthCheck => self.log_health(code, now),
        }
    }
}

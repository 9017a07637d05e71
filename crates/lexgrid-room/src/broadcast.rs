//! Full board resyncs: periodic, on request and on rejoin.
//!
//! Every outgoing snapshot is checked before it leaves: the event is
//! encoded exactly as it will go on the wire, decoded again, and the
//! board's checksum recomputed from the decoded copy. A mismatch means the
//! payload would make clients drift, and the sync counts as failed.

use std::time::{Duration, Instant};

use lexgrid_board::{Board, Checksum};
use lexgrid_protocol::{
    BoardResync, Codec, JsonCodec, MatchStatus, PlayerId, RoomCode, RoomView, ServerEvent,
    SyncType,
};
use tracing::{debug, error, info, warn};

use crate::{RetryDecision, Room, RoomError, RoomRegistry, RoomTimer};

/// Why a sync did not count as a success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The room has no board to send.
    #[error("no board to sync")]
    NoBoard,

    /// The checksum recomputed after a wire round trip differs.
    #[error("checksum drift: expected {expected}, got {actual}")]
    ChecksumDrift { expected: Checksum, actual: Checksum },

    /// The payload did not survive encoding.
    #[error("payload encoding failed: {0}")]
    Encode(String),

    /// Building and verifying the sync took too long; nothing was sent.
    #[error("sync took {elapsed:?}, limit {limit:?}")]
    Timeout { elapsed: Duration, limit: Duration },
}

/// Encodes `event`, decodes it back and checks the board it carries
/// against `expected`.
///
/// Events without a board pass trivially.
pub fn verify_event(event: &ServerEvent, expected: &Checksum) -> Result<(), SyncError> {
    let bytes = JsonCodec
        .encode(event)
        .map_err(|e| SyncError::Encode(e.to_string()))?;
    let decoded: ServerEvent = JsonCodec
        .decode(&bytes)
        .map_err(|e| SyncError::Encode(e.to_string()))?;
    let (board, sent) = match &decoded {
        ServerEvent::MatchStarted(m) => (&m.board, &m.board_checksum),
        ServerEvent::BoardResync(r) => (&r.board, &r.board_checksum),
        _ => return Ok(()),
    };
    let actual = board.checksum();
    if &actual != expected || sent != expected {
        return Err(SyncError::ChecksumDrift {
            expected: expected.clone(),
            actual,
        });
    }
    Ok(())
}

/// Builds the next resync for `room` from `board`, bumping its sync id.
fn next_resync(room: &mut Room, board: Board, time_remaining: u32, sync_type: SyncType) -> BoardResync {
    room.state.sync_id += 1;
    BoardResync {
        board_checksum: board.checksum(),
        board,
        time_remaining,
        sequence_number: room.state.diff_seq,
        sync_id: room.state.sync_id,
        sync_type,
    }
}

/// Builds and verifies a resync of the room's current board.
fn build_verified(room: &mut Room, now: Instant, sync_type: SyncType) -> Result<ServerEvent, SyncError> {
    let board = room.state.board.clone().ok_or(SyncError::NoBoard)?;
    let time_remaining = room.time_remaining(now);
    let payload = next_resync(room, board, time_remaining, sync_type);
    let expected = payload.board_checksum.clone();
    let event = ServerEvent::BoardResync(payload);
    verify_event(&event, &expected)?;
    Ok(event)
}

impl RoomRegistry {
    /// Resync timer: broadcast the board, then schedule the next one from
    /// the room's activity, or back off after a failure.
    pub(crate) fn perform_periodic_sync(&mut self, code: &RoomCode, now: Instant) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        if room.status() != MatchStatus::Active {
            return;
        }
        let Some(health) = self.health.get_mut(code) else {
            return;
        };

        let started = Instant::now();
        // A late snapshot is dropped unsent; only the retry goes out.
        let result = build_verified(room, now, SyncType::Periodic).and_then(|event| {
            let elapsed = started.elapsed();
            let limit = self.sync_config.sync_timeout;
            if elapsed > limit {
                return Err(SyncError::Timeout { elapsed, limit });
            }
            self.outbox.to_room(room, event);
            Ok(elapsed)
        });

        let delay = match result {
            Ok(latency) => {
                health.record_success(latency);
                let tier = health.select_tier(now, &self.sync_config);
                debug!(room = %code, sync_id = room.state.sync_id, %tier, "periodic resync sent");
                tier.interval(&self.sync_config)
            }
            Err(e) => {
                match &e {
                    SyncError::ChecksumDrift { .. } => error!(room = %code, error = %e, "resync verification failed"),
                    _ => warn!(room = %code, error = %e, "resync failed"),
                }
                match health.record_failure(&self.sync_config.retry) {
                    RetryDecision::RetryAfter(delay) => {
                        debug!(room = %code, ?delay, "retrying resync");
                        delay
                    }
                    RetryDecision::GiveUp => {
                        warn!(
                            room = %code,
                            retries = self.sync_config.retry.max_retries,
                            "resync retries exhausted, waiting for next interval"
                        );
                        health.next_interval(now, &self.sync_config)
                    }
                }
            }
        };
        self.schedule_in(code, RoomTimer::Resync, now, delay);
    }

    /// A client saw drift and wants the full board. Honoured at most once
    /// per `resync_request_throttle` per player, during an active round.
    ///
    /// Returns `true` if a resync was sent.
    pub fn request_resync(&mut self, player: PlayerId, now: Instant) -> bool {
        let Some(room) = self.player_rooms.get(&player).and_then(|c| self.rooms.get_mut(c)) else {
            return false;
        };
        if room.status() != MatchStatus::Active {
            return false;
        }
        let throttle = self.sync_config.resync_request_throttle;
        if let Some(&last) = room.resync_requests.get(&player) {
            if now.saturating_duration_since(last) < throttle {
                debug!(room = %room.code, player_id = %player, "resync request throttled");
                return false;
            }
        }
        room.resync_requests.insert(player, now);

        match build_verified(room, now, SyncType::Periodic) {
            Ok(event) => {
                debug!(room = %room.code, player_id = %player, "resync on request");
                self.outbox.to_player(player, event);
                true
            }
            Err(e) => {
                error!(room = %room.code, player_id = %player, error = %e, "requested resync failed");
                false
            }
        }
    }

    /// Puts a returning player back in their seat and catches them up.
    ///
    /// Mid-round they get the current board with the time left. During a
    /// countdown they get the board that is about to be played plus the
    /// remaining countdown.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if the player no longer has a seat.
    pub fn reconnect(&mut self, player: PlayerId, now: Instant) -> Result<RoomView, RoomError> {
        let room = self
            .player_rooms
            .get(&player)
            .and_then(|c| self.rooms.get_mut(c))
            .ok_or(RoomError::NotInRoom(player))?;
        let seat = room
            .player_mut(player)
            .ok_or(RoomError::NotInRoom(player))?;
        seat.is_connected = true;
        room.touch(now);
        info!(room = %room.code, player_id = %player, status = %room.status(), "player rejoined");

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

        match room.status() {
            MatchStatus::Active => match build_verified(room, now, SyncType::Rejoin) {
                Ok(event) => self.outbox.to_player(player, event),
                Err(e) => error!(room = %room.code, player_id = %player, error = %e, "rejoin resync failed"),
            },
            MatchStatus::Starting => {
                let board = room
                    .state
                    .upcoming_board
                    .clone()
                    .or_else(|| room.state.board.clone());
                if let Some(board) = board {
                    let full = room.settings.round_duration_secs;
                    let payload = next_resync(room, board, full, SyncType::RejoinCountdown);
                    self.outbox.to_player(player, ServerEvent::BoardResync(payload));
                }
                let countdown = room.countdown_remaining(now);
                self.outbox
                    .to_player(player, ServerEvent::MatchStarting { countdown });
            }
            _ => {}
        }
        Ok(view)
    }
}

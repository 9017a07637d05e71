//! Keeps the local board mirror in step with the server.
//!
//! Diffs are applied strictly in sequence order. Anything that arrives early
//! waits in a bounded buffer keyed by sequence number until its predecessors
//! have been applied; anything at or below the last applied sequence is a
//! duplicate. Full resyncs replace the mirror when it has drifted.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use lexgrid_board::Board;
use lexgrid_protocol::{
    BoardResync, ClientEvent, MatchStarted, ServerEvent, SyncType, TileChangeBatch,
};
use tracing::{debug, error, info, trace, warn};

use crate::{ClientError, LadderConfig, RecoveryLadder, Renderer};

#[derive(Debug, Clone)]
pub struct ClientSyncConfig {
    /// Most diffs held while waiting for a gap to fill.
    pub pending_cap: usize,
    /// How long one diff may keep the renderer busy before the client gives
    /// up on the buffered ones and asks for a resync.
    pub processing_timeout: Duration,
    /// Minimum gap between two resync requests.
    pub resync_throttle: Duration,
    pub ladder: LadderConfig,
}

impl Default for ClientSyncConfig {
    fn default() -> Self {
        Self {
            pending_cap: 64,
            processing_timeout: Duration::from_secs(3),
            resync_throttle: Duration::from_secs(5),
            ladder: LadderConfig::default(),
        }
    }
}

/// What happened to a `board:resync`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// Older than one already seen. Ignored.
    Stale,
    /// The payload's board does not match its own checksum.
    Rejected,
    /// The mirror already matched.
    InSync,
    /// The mirror was behind or empty and was replaced.
    Adopted,
    /// The mirror was at the same sequence but differed. Replaced, and the
    /// recovery ladder started.
    Drift,
}

/// What happened to a `game:tile-changes` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    Applied,
    /// Held until its predecessors arrive or the renderer frees up.
    Buffered,
    Duplicate,
    /// The buffer was full. It was cleared and a resync requested.
    Overflow,
    /// The diff did not fit the mirror. It was skipped and a resync
    /// requested.
    Failed,
}

pub struct ClientSync<R: Renderer> {
    config: ClientSyncConfig,
    renderer: R,
    board: Option<Board>,
    last_applied: u64,
    last_sync_id: u64,
    time_remaining: u32,
    pending: BTreeMap<u64, TileChangeBatch>,
    processing_since: Option<Instant>,
    ladder: RecoveryLadder,
    last_resync_request: Option<Instant>,
    requests: Vec<ClientEvent>,
}

impl<R: Renderer> ClientSync<R> {
    pub fn new(config: ClientSyncConfig, renderer: R) -> Self {
        Self {
            ladder: RecoveryLadder::new(config.ladder.clone()),
            config,
            renderer,
            board: None,
            last_applied: 0,
            last_sync_id: 0,
            time_remaining: 0,
            pending: BTreeMap::new(),
            processing_since: None,
            last_resync_request: None,
            requests: Vec::new(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// Sequence number of the last diff applied to the mirror.
    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    pub fn last_sync_id(&self) -> u64 {
        self.last_sync_id
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_processing(&self) -> bool {
        self.processing_since.is_some()
    }

    pub fn ladder(&self) -> &RecoveryLadder {
        &self.ladder
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Takes the events queued for the server.
    pub fn drain_requests(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.requests)
    }

    // -- inbound ------------------------------------------------------------

    /// Routes the board-related server events. Others are ignored.
    pub fn handle(&mut self, event: ServerEvent, now: Instant) {
        match event {
            ServerEvent::MatchStarted(started) => {
                if let Err(e) = self.on_match_started(started, now) {
                    warn!(error = %e, "match start rejected");
                }
            }
            ServerEvent::BoardResync(resync) => {
                self.on_resync(resync, now);
            }
            ServerEvent::TileChanges(batch) => {
                self.on_tile_changes(batch, now);
            }
            ServerEvent::TimerUpdate { time_remaining } => self.time_remaining = time_remaining,
            _ => {}
        }
    }

    /// A round began. Replaces the mirror and the display.
    ///
    /// # Errors
    /// [`ClientError::ChecksumMismatch`] if the board does not hash to the
    /// carried checksum. A resync is requested and nothing changes.
    pub fn on_match_started(&mut self, started: MatchStarted, now: Instant) -> Result<(), ClientError> {
        let computed = started.board.checksum();
        if computed != started.board_checksum {
            self.request_resync(now);
            return Err(ClientError::ChecksumMismatch {
                carried: started.board_checksum,
                computed,
            });
        }
        info!(
            round = started.current_round,
            total_rounds = started.total_rounds,
            checksum = %computed,
            "round started"
        );
        self.time_remaining = started.time_remaining;
        self.adopt(started.board, started.sequence_number);
        self.drain_pending(now);
        Ok(())
    }

    pub fn on_resync(&mut self, resync: BoardResync, now: Instant) -> ResyncOutcome {
        if resync.sync_id <= self.last_sync_id {
            debug!(sync_id = resync.sync_id, last = self.last_sync_id, "stale resync ignored");
            return ResyncOutcome::Stale;
        }
        if self.board.is_some() && resync.sequence_number < self.last_applied {
            debug!(
                sequence = resync.sequence_number,
                last_applied = self.last_applied,
                "resync behind local mirror ignored"
            );
            return ResyncOutcome::Stale;
        }
        self.last_sync_id = resync.sync_id;

        let computed = resync.board.checksum();
        if computed != resync.board_checksum {
            warn!(
                sync_id = resync.sync_id,
                carried = %resync.board_checksum,
                %computed,
                "resync payload inconsistent, rejecting"
            );
            self.request_resync(now);
            return ResyncOutcome::Rejected;
        }
        self.time_remaining = resync.time_remaining;

        // A countdown rejoin carries the board of the round about to start,
        // which legitimately differs from the last round's board.
        let next_round = resync.sync_type == SyncType::RejoinCountdown;
        let outcome = match &self.board {
            Some(local) if !next_round && self.last_applied == resync.sequence_number => {
                let local = local.checksum();
                if local == computed {
                    trace!(sync_id = resync.sync_id, "board in sync");
                    return ResyncOutcome::InSync;
                }
                error!(
                    sync_id = resync.sync_id,
                    sequence = resync.sequence_number,
                    %local,
                    server = %computed,
                    "board drift detected, adopting server board"
                );
                ResyncOutcome::Drift
            }
            _ => ResyncOutcome::Adopted,
        };

        match outcome {
            ResyncOutcome::Drift => {
                self.board = Some(resync.board);
                self.last_applied = resync.sequence_number;
                self.pending.retain(|&seq, _| seq > resync.sequence_number);
                self.processing_since = None;
                self.ladder.start();
                self.step_ladder(now);
            }
            _ => {
                debug!(
                    sync_id = resync.sync_id,
                    sync_type = ?resync.sync_type,
                    sequence = resync.sequence_number,
                    "adopting server board"
                );
                self.adopt(resync.board, resync.sequence_number);
            }
        }
        self.drain_pending(now);
        outcome
    }

    pub fn on_tile_changes(&mut self, batch: TileChangeBatch, now: Instant) -> DiffOutcome {
        let seq = batch.sequence_number;
        if seq <= self.last_applied || self.pending.contains_key(&seq) {
            debug!(sequence = seq, last_applied = self.last_applied, "duplicate diff dropped");
            return DiffOutcome::Duplicate;
        }
        let in_line = seq == self.last_applied + 1;
        if in_line && self.board.is_some() && !self.is_processing() && self.pending.is_empty() {
            let outcome = self.apply(batch, now);
            self.drain_pending(now);
            return outcome;
        }

        if self.pending.len() >= self.config.pending_cap {
            warn!(
                sequence = seq,
                cap = self.config.pending_cap,
                "diff buffer overflow, requesting resync"
            );
            self.pending.clear();
            self.request_resync(now);
            return DiffOutcome::Overflow;
        }
        trace!(sequence = seq, last_applied = self.last_applied, "diff buffered");
        self.pending.insert(seq, batch);
        self.drain_pending(now);
        if seq <= self.last_applied {
            DiffOutcome::Applied
        } else {
            DiffOutcome::Buffered
        }
    }

    // -- housekeeping -------------------------------------------------------

    /// Advances the client: finishes or abandons the diff in flight, applies
    /// buffered diffs that are now in line, and steps the recovery ladder.
    pub fn poll(&mut self, now: Instant) {
        if let Some(since) = self.processing_since {
            if !self.renderer.is_busy() {
                self.processing_since = None;
            } else if now.saturating_duration_since(since) >= self.config.processing_timeout {
                let skipped_to = self
                    .pending
                    .last_key_value()
                    .map_or(self.last_applied, |(&seq, _)| seq);
                warn!(
                    discarded = self.pending.len(),
                    last_applied = self.last_applied,
                    skipped_to,
                    "diff processing timed out"
                );
                self.pending.clear();
                self.last_applied = skipped_to;
                self.processing_since = None;
                self.request_resync(now);
            }
        }
        self.drain_pending(now);
        self.step_ladder(now);
    }

    /// Queues a `board:request-resync` unless one went out within
    /// `resync_throttle`.
    ///
    /// Returns `true` if a request was queued.
    pub fn request_resync(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_resync_request {
            if now.saturating_duration_since(last) < self.config.resync_throttle {
                debug!("resync request throttled");
                return false;
            }
        }
        self.last_resync_request = Some(now);
        self.requests.push(ClientEvent::RequestResync);
        true
    }

    // -- internals ----------------------------------------------------------

    fn adopt(&mut self, board: Board, sequence: u64) {
        self.renderer.update_board(&board);
        self.board = Some(board);
        self.last_applied = sequence;
        self.pending.retain(|&seq, _| seq > sequence);
        self.processing_since = None;
    }

    fn apply(&mut self, batch: TileChangeBatch, now: Instant) -> DiffOutcome {
        let seq = batch.sequence_number;
        let Some(board) = self.board.as_mut() else {
            return DiffOutcome::Failed;
        };
        self.last_applied = seq;
        if let Err(e) = board.apply_changes(&batch.changes) {
            let e = ClientError::from(e);
            warn!(sequence = seq, error = %e, "diff did not apply, requesting resync");
            self.request_resync(now);
            return DiffOutcome::Failed;
        }
        self.renderer.apply_diff(seq, &batch.changes, board);
        if self.renderer.is_busy() {
            self.processing_since = Some(now);
        }
        trace!(sequence = seq, "diff applied");
        DiffOutcome::Applied
    }

    fn drain_pending(&mut self, now: Instant) {
        if self.board.is_none() {
            return;
        }
        while !self.is_processing() {
            let Some(entry) = self.pending.first_entry() else {
                break;
            };
            let seq = *entry.key();
            if seq <= self.last_applied {
                entry.remove();
                continue;
            }
            if seq != self.last_applied + 1 {
                break;
            }
            let batch = entry.remove();
            self.apply(batch, now);
        }
    }

    fn step_ladder(&mut self, now: Instant) {
        if let Some(board) = self.board.as_ref() {
            self.ladder.step(now, &mut self.renderer, board);
        }
    }
}

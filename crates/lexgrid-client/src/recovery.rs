//! Escalating repair of a drifted presentation.
//!
//! When the drawn board stops matching the synced board, the client tries
//! the cheapest fix first and escalates only if it did not help:
//!
//! ```text
//! TileRefresh → BoardRefresh → PresentationRestart → FullRestart
//! ```
//!
//! One rung is tried per [`RecoveryLadder::step`], never two within
//! `cooldown` of each other. A successful rung resets the ladder.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use lexgrid_board::Board;
use tracing::{debug, info, warn};

use crate::Renderer;

// ---------------------------------------------------------------------------
// Rung
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rung {
    TileRefresh,
    BoardRefresh,
    PresentationRestart,
    FullRestart,
}

impl Rung {
    /// The rung to try if this one fails.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::TileRefresh => Some(Self::BoardRefresh),
            Self::BoardRefresh => Some(Self::PresentationRestart),
            Self::PresentationRestart => Some(Self::FullRestart),
            Self::FullRestart => None,
        }
    }

    fn run<R: Renderer>(self, renderer: &mut R, board: &Board) -> bool {
        match self {
            Self::TileRefresh => {
                let stale = renderer.stale_tiles(board);
                if stale.is_empty() {
                    return true;
                }
                renderer.refresh_tiles(board, &stale) && renderer.stale_tiles(board).is_empty()
            }
            Self::BoardRefresh => renderer.refresh_board(board),
            Self::PresentationRestart => renderer.restart_presentation(board),
            Self::FullRestart => renderer.request_full_restart(),
        }
    }
}

impl fmt::Display for Rung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TileRefresh => "tile-refresh",
            Self::BoardRefresh => "board-refresh",
            Self::PresentationRestart => "presentation-restart",
            Self::FullRestart => "full-restart",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Config and history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LadderConfig {
    /// Minimum gap between two attempts.
    pub cooldown: Duration,
    /// Attempts remembered for the success rate.
    pub history_len: usize,
    /// Failures within `alert_window` at which the ladder reports an alert.
    pub alert_failures: usize,
    pub alert_window: Duration,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2),
            history_len: 20,
            alert_failures: 3,
            alert_window: Duration::from_secs(5 * 60),
        }
    }
}

/// One rung attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryAttempt {
    pub rung: Rung,
    pub at: Instant,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderState {
    /// Nothing to repair.
    Idle,
    /// Repair in progress; `next` is the rung the next step will try.
    Recovering { next: Rung },
    /// Every rung failed. A new problem starts over from the bottom.
    Exhausted,
}

// ---------------------------------------------------------------------------
// RecoveryLadder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecoveryLadder {
    config: LadderConfig,
    state: LadderState,
    last_attempt: Option<Instant>,
    history: VecDeque<RecoveryAttempt>,
}

impl RecoveryLadder {
    pub fn new(config: LadderConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len),
            config,
            state: LadderState::Idle,
            last_attempt: None,
        }
    }

    pub fn state(&self) -> LadderState {
        self.state
    }

    pub fn is_recovering(&self) -> bool {
        matches!(self.state, LadderState::Recovering { .. })
    }

    /// Flags a problem. Starts at the bottom rung unless a repair is
    /// already under way.
    pub fn start(&mut self) {
        if !self.is_recovering() {
            debug!("presentation drift, starting recovery");
            self.state = LadderState::Recovering {
                next: Rung::TileRefresh,
            };
        }
    }

    /// `true` if the cooldown since the last attempt has passed.
    pub fn can_attempt(&self, now: Instant) -> bool {
        self.last_attempt
            .is_none_or(|last| now.saturating_duration_since(last) >= self.config.cooldown)
    }

    /// Tries the current rung if one is due.
    ///
    /// Returns the attempt made, or `None` when idle, exhausted or still
    /// cooling down.
    pub fn step<R: Renderer>(
        &mut self,
        now: Instant,
        renderer: &mut R,
        board: &Board,
    ) -> Option<RecoveryAttempt> {
        let LadderState::Recovering { next: rung } = self.state else {
            return None;
        };
        if !self.can_attempt(now) {
            return None;
        }

        let succeeded = rung.run(renderer, board);
        let attempt = RecoveryAttempt {
            rung,
            at: now,
            succeeded,
        };
        self.last_attempt = Some(now);
        self.record(attempt);

        self.state = if succeeded {
            info!(%rung, "presentation recovered");
            LadderState::Idle
        } else {
            match rung.next() {
                Some(next) => {
                    debug!(%rung, %next, "recovery rung failed, escalating");
                    LadderState::Recovering { next }
                }
                None => {
                    warn!("every recovery rung failed");
                    LadderState::Exhausted
                }
            }
        };

        if !succeeded && self.is_alerting(now) {
            warn!(
                failures = self.recent_failures(now),
                window = ?self.config.alert_window,
                "repeated presentation recovery failures"
            );
        }
        Some(attempt)
    }

    /// Share of remembered attempts that succeeded. `1.0` with no history.
    pub fn success_rate(&self) -> f64 {
        if self.history.is_empty() {
            return 1.0;
        }
        let ok = self.history.iter().filter(|a| a.succeeded).count();
        ok as f64 / self.history.len() as f64
    }

    /// Failed attempts within the alert window ending at `now`.
    pub fn recent_failures(&self, now: Instant) -> usize {
        self.history
            .iter()
            .filter(|a| !a.succeeded && now.saturating_duration_since(a.at) <= self.config.alert_window)
            .count()
    }

    pub fn is_alerting(&self, now: Instant) -> bool {
        self.recent_failures(now) >= self.config.alert_failures
    }

    pub fn history(&self) -> impl Iterator<Item = &RecoveryAttempt> {
        self.history.iter()
    }

    fn record(&mut self, attempt: RecoveryAttempt) {
        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(attempt);
    }
}

impl Default for RecoveryLadder {
    fn default() -> Self {
        Self::new(LadderConfig::default())
    }
}

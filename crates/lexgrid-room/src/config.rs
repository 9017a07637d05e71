//! Room and synchronization configuration.

use std::time::Duration;

use tracing::warn;

use crate::RetryPolicy;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Server-wide settings shared by every room.
///
/// Per-match choices (rounds, round length, difficulty) live in
/// [`MatchSettings`](lexgrid_protocol::MatchSettings) instead.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Maximum players in a room.
    pub capacity: usize,

    /// Connected players required to start a match.
    pub min_players: usize,

    /// Board dimensions in tiles.
    pub board_width: u16,
    pub board_height: u16,

    /// Pre-round countdown. Zero starts rounds immediately.
    pub countdown: Duration,

    /// Pause between a round ending and the next countdown.
    pub round_end_delay: Duration,

    /// How long final results stay up before the room returns to lobby.
    pub results_delay: Duration,

    /// Round clock resolution.
    pub clock_tick: Duration,

    /// Rooms with no activity for this long are evicted.
    pub idle_timeout: Duration,

    /// How often the idle sweep runs.
    pub sweep_interval: Duration,

    /// Shortest word accepted.
    pub min_word_len: usize,

    /// Longest display name accepted (after trimming).
    pub max_name_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            min_players: 2,
            board_width: 5,
            board_height: 5,
            countdown: Duration::from_secs(3),
            round_end_delay: Duration::from_secs(5),
            results_delay: Duration::from_secs(10),
            clock_tick: Duration::from_millis(250),
            idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            min_word_len: 3,
            max_name_len: 20,
        }
    }
}

impl RoomConfig {
    pub const MAX_CAPACITY: usize = 16;
    pub const MIN_CLOCK_TICK: Duration = Duration::from_millis(50);
    pub const MAX_CLOCK_TICK: Duration = Duration::from_secs(1);

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - `min_players` at least 1, `capacity` in `min_players..=MAX_CAPACITY`.
    /// - Board sides in `3..=10`.
    /// - `clock_tick` in `MIN_CLOCK_TICK..=MAX_CLOCK_TICK`.
    /// - `sweep_interval` at least one second.
    pub fn validated(mut self) -> Self {
        self.min_players = self.min_players.max(1);
        let capacity = self.capacity.clamp(self.min_players, Self::MAX_CAPACITY.max(self.min_players));
        if capacity != self.capacity {
            warn!(requested = self.capacity, capacity, "room capacity clamped");
            self.capacity = capacity;
        }
        self.board_width = self.board_width.clamp(3, 10);
        self.board_height = self.board_height.clamp(3, 10);
        if !(Self::MIN_CLOCK_TICK..=Self::MAX_CLOCK_TICK).contains(&self.clock_tick) {
            warn!(requested = ?self.clock_tick, "clock_tick out of range, clamping");
            self.clock_tick = self.clock_tick.clamp(Self::MIN_CLOCK_TICK, Self::MAX_CLOCK_TICK);
        }
        self.sweep_interval = self.sweep_interval.max(Duration::from_secs(1));
        self.min_word_len = self.min_word_len.max(1);
        self.max_name_len = self.max_name_len.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Full board resync scheduling and health settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Resync interval per activity tier.
    pub inactive_interval: Duration,
    pub low_interval: Duration,
    pub medium_interval: Duration,
    pub high_interval: Duration,

    /// A room with no player action for this long is `inactive`.
    pub inactive_after: Duration,

    /// Half-life of the decayed activity score.
    pub activity_half_life: Duration,

    /// Decayed activity below this is `low`, below `medium_activity` is
    /// `medium`, anything higher is `high`.
    pub low_activity: f64,
    pub medium_activity: f64,

    /// Below this success rate (with at least three attempts) the next
    /// more frequent tier is used.
    pub low_success_rate: f64,

    /// A sync that takes longer than this counts as failed.
    pub sync_timeout: Duration,

    /// Backoff for failed syncs.
    pub retry: RetryPolicy,

    /// How often each active room logs its sync health.
    pub health_check_interval: Duration,

    /// Minimum gap between honoured client resync requests, per player.
    pub resync_request_throttle: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            inactive_interval: Duration::from_secs(30),
            low_interval: Duration::from_secs(15),
            medium_interval: Duration::from_secs(8),
            high_interval: Duration::from_secs(4),
            inactive_after: Duration::from_secs(3 * 60),
            activity_half_life: Duration::from_secs(60),
            low_activity: 3.0,
            medium_activity: 10.0,
            low_success_rate: 0.8,
            sync_timeout: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            health_check_interval: Duration::from_secs(30),
            resync_request_throttle: Duration::from_secs(2),
        }
    }
}

impl SyncConfig {
    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Intervals are floored at one second, the half-life at one second,
    /// and the success-rate threshold clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        let floor = Duration::from_secs(1);
        for interval in [
            &mut self.inactive_interval,
            &mut self.low_interval,
            &mut self.medium_interval,
            &mut self.high_interval,
            &mut self.health_check_interval,
            &mut self.activity_half_life,
        ] {
            if *interval < floor {
                warn!(requested = ?*interval, "sync interval below one second, clamping");
                *interval = floor;
            }
        }
        self.low_success_rate = self.low_success_rate.clamp(0.0, 1.0);
        if self.medium_activity < self.low_activity {
            self.medium_activity = self.low_activity;
        }
        self
    }
}

//! Per-room board sync health: activity tiers, retry backoff and success
//! tracking.
//!
//! A room's resync interval adapts to how busy it is. Every player action
//! bumps a decaying activity score; the score picks an [`ActivityTier`] and
//! the tier picks the interval. Failed syncs back off exponentially and a
//! poor success rate pushes the room one tier more frequent.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use crate::SyncConfig;

/// Outcomes remembered for the success rate.
const RECENT_WINDOW: usize = 20;

/// Attempts needed before the success rate can change the tier.
const MIN_ATTEMPTS_FOR_RATE: usize = 3;

/// Weight of the newest sample in the rolling sync latency.
const LATENCY_EMA_ALPHA: f64 = 0.1;

// ---------------------------------------------------------------------------
// ActivityTier
// ---------------------------------------------------------------------------

/// How busy a room is, from idle to hectic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActivityTier {
    Inactive,
    Low,
    Medium,
    High,
}

impl ActivityTier {
    /// The tier one step busier. `High` stays `High`.
    pub fn more_frequent(self) -> Self {
        match self {
            Self::Inactive => Self::Low,
            Self::Low => Self::Medium,
            Self::Medium | Self::High => Self::High,
        }
    }

    /// Resync interval for this tier.
    pub fn interval(self, config: &SyncConfig) -> Duration {
        match self {
            Self::Inactive => config.inactive_interval,
            Self::Low => config.low_interval,
            Self::Medium => config.medium_interval,
            Self::High => config.high_interval,
        }
    }
}

impl fmt::Display for ActivityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Exponential backoff for failed syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure before giving up.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// What to do after a failed sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// Retry budget spent. Carry on at the normal interval.
    GiveUp,
}

// ---------------------------------------------------------------------------
// SyncHealth
// ---------------------------------------------------------------------------

/// Sync bookkeeping for one room during an active round.
#[derive(Debug, Clone)]
pub struct SyncHealth {
    activity: f64,
    activity_at: Instant,
    last_action: Instant,
    recent: VecDeque<bool>,
    consecutive_failures: u32,
    total_syncs: u64,
    total_failures: u64,
    avg_latency: Option<Duration>,
}

impl SyncHealth {
    pub fn new(now: Instant) -> Self {
        Self {
            activity: 0.0,
            activity_at: now,
            last_action: now,
            recent: VecDeque::with_capacity(RECENT_WINDOW),
            consecutive_failures: 0,
            total_syncs: 0,
            total_failures: 0,
            avg_latency: None,
        }
    }

    /// Counts one player action.
    pub fn record_activity(&mut self, now: Instant, config: &SyncConfig) {
        self.activity = self.activity_score(now, config) + 1.0;
        self.activity_at = now;
        self.last_action = now;
    }

    /// The activity score decayed to `now`.
    pub fn activity_score(&self, now: Instant, config: &SyncConfig) -> f64 {
        let dt = now.saturating_duration_since(self.activity_at).as_secs_f64();
        let half_life = config.activity_half_life.as_secs_f64().max(f64::EPSILON);
        self.activity * 0.5f64.powf(dt / half_life)
    }

    /// Tier from activity alone, before the success-rate adjustment.
    pub fn activity_tier(&self, now: Instant, config: &SyncConfig) -> ActivityTier {
        if now.saturating_duration_since(self.last_action) >= config.inactive_after {
            return ActivityTier::Inactive;
        }
        let score = self.activity_score(now, config);
        if score < config.low_activity {
            ActivityTier::Low
        } else if score < config.medium_activity {
            ActivityTier::Medium
        } else {
            ActivityTier::High
        }
    }

    /// The tier that decides the next interval.
    pub fn select_tier(&self, now: Instant, config: &SyncConfig) -> ActivityTier {
        let tier = self.activity_tier(now, config);
        if self.recent.len() >= MIN_ATTEMPTS_FOR_RATE
            && self.success_rate() < config.low_success_rate
        {
            return tier.more_frequent();
        }
        tier
    }

    pub fn next_interval(&self, now: Instant, config: &SyncConfig) -> Duration {
        self.select_tier(now, config).interval(config)
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.push_outcome(true);
        self.consecutive_failures = 0;
        self.avg_latency = Some(match self.avg_latency {
            None => latency,
            Some(avg) => {
                avg.mul_f64(1.0 - LATENCY_EMA_ALPHA) + latency.mul_f64(LATENCY_EMA_ALPHA)
            }
        });
    }

    /// Records a failure and decides whether to retry.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> RetryDecision {
        self.push_outcome(false);
        self.total_failures += 1;
        self.consecutive_failures += 1;
        if self.consecutive_failures > policy.max_retries {
            self.consecutive_failures = 0;
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(policy.delay_for(self.consecutive_failures))
    }

    /// Share of recent syncs that succeeded. `1.0` before any attempt.
    pub fn success_rate(&self) -> f64 {
        if self.recent.is_empty() {
            return 1.0;
        }
        let ok = self.recent.iter().filter(|&&ok| ok).count();
        ok as f64 / self.recent.len() as f64
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_syncs(&self) -> u64 {
        self.total_syncs
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    pub fn average_latency(&self) -> Option<Duration> {
        self.avg_latency
    }

    /// `true` when more than half of the recent syncs failed.
    pub fn is_degraded(&self) -> bool {
        self.recent.len() >= MIN_ATTEMPTS_FOR_RATE && self.success_rate() < 0.5
    }

    fn push_outcome(&mut self, ok: bool) {
        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(ok);
        self.total_syncs += 1;
    }
}

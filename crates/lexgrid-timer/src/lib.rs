//! Keyed, cancelable deadlines for Lexgrid's room engine.
//!
//! Rooms need several independent timers (countdown, round clock, resync,
//! health check, delayed transitions). Instead of one spawned task per
//! timer, a single [`TimerWheel`] holds every deadline under a caller
//! chosen key, and the engine loop sleeps until the earliest one:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = rx.recv() => { /* handle inbound event */ }
//!         _ = sleep_until_due(wheel.next_deadline()) => {
//!             let now = tokio::time::Instant::now().into_std();
//!             while let Some(key) = wheel.pop_due(now) { /* fire */ }
//!         }
//!     }
//! }
//! ```
//!
//! Scheduling a key that already exists replaces the old deadline, and a
//! cancelled or replaced deadline can never fire afterwards: it is removed
//! from the wheel, not flagged.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// TimerWheel
// ---------------------------------------------------------------------------

/// A set of pending deadlines, at most one per key.
///
/// Deadlines that tie fire in the order they were scheduled.
#[derive(Debug)]
pub struct TimerWheel<K> {
    /// Ordered by `(deadline, schedule order)`.
    by_deadline: BTreeMap<(Instant, u64), K>,
    /// Reverse index so cancel and reschedule are O(log n).
    by_key: HashMap<K, (Instant, u64)>,
    next_seq: u64,
}

impl<K: Clone + Eq + Hash> TimerWheel<K> {
    pub fn new() -> Self {
        Self {
            by_deadline: BTreeMap::new(),
            by_key: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `key` to fire at `deadline`.
    ///
    /// Returns `true` if an earlier deadline for the same key was replaced.
    pub fn schedule(&mut self, key: K, deadline: Instant) -> bool {
        let replaced = self.cancel(&key);
        let slot = (deadline, self.next_seq);
        self.next_seq += 1;
        self.by_deadline.insert(slot, key.clone());
        self.by_key.insert(key, slot);
        replaced
    }

    /// Convenience for `schedule(key, now + delay)`.
    pub fn schedule_in(&mut self, key: K, now: Instant, delay: Duration) -> bool {
        self.schedule(key, now + delay)
    }

    /// Removes the deadline for `key`. Returns `true` if one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.by_key.remove(key) {
            Some(slot) => {
                self.by_deadline.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Removes every deadline whose key matches `pred`. Returns how many.
    pub fn cancel_where(&mut self, pred: impl Fn(&K) -> bool) -> usize {
        let doomed: Vec<K> = self.by_key.keys().filter(|k| pred(k)).cloned().collect();
        for key in &doomed {
            self.cancel(key);
        }
        doomed.len()
    }

    /// The pending deadline for `key`, if any.
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.by_key.get(key).map(|(at, _)| *at)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.keys().next().map(|(at, _)| *at)
    }

    /// Removes and returns the earliest key whose deadline is `<= now`.
    ///
    /// Pop one key at a time: handling a fired key may cancel or
    /// reschedule others, and those changes must be visible to the next pop.
    pub fn pop_due(&mut self, now: Instant) -> Option<K> {
        let (&slot, _) = self.by_deadline.iter().next()?;
        if slot.0 > now {
            return None;
        }
        let key = self.by_deadline.remove(&slot)?;
        self.by_key.remove(&key);
        trace!(late_ms = now.saturating_duration_since(slot.0).as_millis() as u64, "timer fired");
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl<K: Clone + Eq + Hash> Default for TimerWheel<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleeps until `deadline`, or forever when there is none.
///
/// Meant for a `tokio::select!` branch: with no pending timers the branch
/// never completes and the loop only reacts to its other branches.
pub async fn sleep_until_due(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(TokioInstant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}

// ---------------------------------------------------------------------------
// BudgetMonitor
// ---------------------------------------------------------------------------

/// Tracks how long each pass of an event loop takes.
///
/// A warning is logged when a pass uses more than `warn_threshold` of the
/// budget. The engine runs every room on one task, so a slow pass delays
/// every room's timers.
#[derive(Debug, Clone)]
pub struct BudgetMonitor {
    budget: Duration,
    warn_threshold: f64,
    metrics: LoopMetrics,
}

/// Runtime metrics collected by [`BudgetMonitor`].
#[derive(Debug, Clone, Default)]
pub struct LoopMetrics {
    /// Passes recorded.
    pub passes: u64,
    /// Passes that exceeded the warning threshold.
    pub slow_passes: u64,
    /// Exponential moving average of pass time (α = 0.1).
    pub avg_pass_time: Duration,
    pub max_pass_time: Duration,
}

impl BudgetMonitor {
    /// `warn_threshold` is a fraction of `budget`, clamped to `0.0..=1.0`.
    pub fn new(budget: Duration, warn_threshold: f64) -> Self {
        Self {
            budget,
            warn_threshold: warn_threshold.clamp(0.0, 1.0),
            metrics: LoopMetrics::default(),
        }
    }

    /// Records one pass that took `elapsed`.
    pub fn record(&mut self, elapsed: Duration) {
        self.metrics.passes += 1;
        if elapsed > self.metrics.max_pass_time {
            self.metrics.max_pass_time = elapsed;
        }

        let alpha = 0.1;
        let prev = self.metrics.avg_pass_time.as_secs_f64();
        self.metrics.avg_pass_time =
            Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);

        if self.budget.is_zero() {
            return;
        }
        let utilization = elapsed.as_secs_f64() / self.budget.as_secs_f64();
        if utilization >= self.warn_threshold {
            self.metrics.slow_passes += 1;
            warn!(
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.budget.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "engine pass approaching budget"
            );
        }
    }

    pub fn metrics(&self) -> &LoopMetrics {
        &self.metrics
    }
}

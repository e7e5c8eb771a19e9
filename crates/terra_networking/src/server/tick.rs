//! # Server Tick Loop
//!
//! Fixed-timestep pacing for the simulation thread.
//!
//! ## Design
//!
//! The loop accumulates wall time and releases one tick per elapsed tick
//! duration. After a slow tick the accumulator carries the debt and the
//! following ticks run back to back until it is paid. Debt beyond
//! `MAX_BACKLOG_TICKS` is dropped instead: the loop counts it in
//! [`TickStats::dropped_backlogs`] and resumes with a single due tick. Between ticks
//! the caller blocks on its inbound queue for [`TickLoop::time_until_next_tick`]
//! instead of sleeping, so messages are handled as soon as they arrive.

use std::time::{Duration, Instant};

/// Most ticks owed before the loop drops the backlog.
const MAX_BACKLOG_TICKS: u32 = 10;

/// Fixed-timestep tick loop controller.
pub struct TickLoop {
    /// Target tick duration.
    tick_duration: Duration,
    /// Time of last accumulation.
    last_tick: Instant,
    /// Time owed to the simulation.
    accumulator: Duration,
    /// Total ticks executed.
    tick_count: u64,
    /// Tick time statistics.
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug)]
pub struct TickStats {
    /// Shortest tick observed.
    pub min_tick_us: u64,
    /// Longest tick observed.
    pub max_tick_us: u64,
    /// Rolling average tick time.
    pub avg_tick_us: u64,
    /// Ticks that took longer than their budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
    /// Backlogs dropped because the loop fell too far behind.
    pub dropped_backlogs: u64,
}

impl TickStats {
    fn fresh(tick_duration: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: micros(tick_duration),
            late_ticks: 0,
            total_ticks: 0,
            dropped_backlogs: 0,
        }
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl TickLoop {
    /// Creates a tick loop running `tick_rate` times per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_tick: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(tick_duration),
        }
    }

    /// Returns true if a tick is due.
    ///
    /// Call in a loop until it returns false.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_tick);
        self.last_tick = now;

        let cap = self.tick_duration * MAX_BACKLOG_TICKS;
        if self.accumulator > cap {
            self.stats.dropped_backlogs += 1;
            self.accumulator = self.tick_duration;
        }
        self.accumulator >= self.tick_duration
    }

    /// Marks the start of a tick. Returns the start time for
    /// [`end_tick`](Self::end_tick).
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        Instant::now()
    }

    /// Marks the end of a tick and records its duration.
    pub fn end_tick(&mut self, start: Instant) {
        let duration = start.elapsed();
        let duration_us = micros(duration);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us.saturating_mul(15) + duration_us) / 16;

        if duration > self.tick_duration {
            self.stats.late_ticks += 1;
        }
    }

    /// How long until the next tick is due. Zero when one is already due.
    #[must_use]
    pub fn time_until_next_tick(&self) -> Duration {
        let owed = self.accumulator + self.last_tick.elapsed();
        self.tick_duration.saturating_sub(owed)
    }

    /// Ticks executed.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.tick_duration);
    }
}

use std::time::{Duration, Instant};

/// Timing snapshot handed to each tick.
#[derive(Debug, Copy, Clone)]
pub struct TickTime {
    /// Fixed step length, in seconds.
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic tick counter.
    pub tick_index: u64,
}

/// Fixed-rate tick scheduler.
///
/// Deadlines advance by exactly one period per tick, so there is no drift. When
/// the loop falls more than one period behind, the schedule is re-anchored at
/// the current time instead of firing a burst of catch-up ticks.
#[derive(Debug, Clone)]
pub struct TickClock {
    period: Duration,
    deadline: Instant,
    tick_index: u64,
    reanchors: u64,
}

impl TickClock {
    /// Clock ticking `rate` times per second; a rate of zero is treated as one.
    pub fn new(rate: u32) -> Self {
        Self::with_period(Duration::from_secs(1) / rate.max(1))
    }

    pub fn with_period(period: Duration) -> Self {
        Self::starting_at(period, Instant::now())
    }

    /// Clock whose first tick is due at `start`.
    pub fn starting_at(period: Duration, start: Instant) -> Self {
        debug_assert!(!period.is_zero());
        Self {
            period,
            deadline: start,
            tick_index: 0,
            reanchors: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the next tick is due.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// How many times the schedule was re-anchored after falling behind.
    pub fn reanchors(&self) -> u64 {
        self.reanchors
    }

    /// Moves the schedule so the next tick is due at `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.deadline = now;
    }

    pub fn tick(&mut self) -> TickTime {
        self.tick_at(Instant::now())
    }

    /// Records a tick taken at `now` and schedules the next deadline.
    pub fn tick_at(&mut self, now: Instant) -> TickTime {
        let behind = now.saturating_duration_since(self.deadline);
        if behind > self.period {
            log::debug!("tick loop {behind:?} behind schedule; re-anchoring");
            self.deadline = now;
            self.reanchors += 1;
        }

        let time = TickTime {
            dt: self.period.as_secs_f32(),
            now,
            tick_index: self.tick_index,
        };

        self.deadline += self.period;
        self.tick_index = self.tick_index.wrapping_add(1);
        time
    }

    /// Time left until the next deadline, measured from `now`.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn rate_sets_period() {
        assert_eq!(TickClock::new(50).period(), 20 * MS);
        assert_eq!(TickClock::new(0).period(), Duration::from_secs(1));
    }

    #[test]
    fn deadlines_advance_by_exact_period() {
        let t0 = Instant::now();
        let mut clock = TickClock::starting_at(10 * MS, t0);

        clock.tick_at(t0);
        assert_eq!(clock.deadline(), t0 + 10 * MS);

        // Slightly late ticks do not shift the schedule.
        clock.tick_at(t0 + 13 * MS);
        assert_eq!(clock.deadline(), t0 + 20 * MS);
        clock.tick_at(t0 + 21 * MS);
        assert_eq!(clock.deadline(), t0 + 30 * MS);
        assert_eq!(clock.reanchors(), 0);
    }

    #[test]
    fn falling_far_behind_reanchors() {
        let t0 = Instant::now();
        let mut clock = TickClock::starting_at(10 * MS, t0);
        clock.tick_at(t0);

        clock.tick_at(t0 + 55 * MS);
        assert_eq!(clock.deadline(), t0 + 65 * MS);
        assert_eq!(clock.reanchors(), 1);
    }

    #[test]
    fn tick_index_and_dt() {
        let t0 = Instant::now();
        let mut clock = TickClock::starting_at(20 * MS, t0);
        let a = clock.tick_at(t0);
        let b = clock.tick_at(t0 + 20 * MS);
        assert_eq!((a.tick_index, b.tick_index), (0, 1));
        assert!((b.dt - 0.02).abs() < 1e-6);
    }

    #[test]
    fn remaining_saturates() {
        let t0 = Instant::now();
        let mut clock = TickClock::starting_at(10 * MS, t0);
        clock.tick_at(t0);
        assert_eq!(clock.remaining(t0 + 4 * MS), 6 * MS);
        assert_eq!(clock.remaining(t0 + 40 * MS), Duration::ZERO);
    }
}

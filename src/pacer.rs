//! Tick pacing.
//!
//! Scheduling decisions only ever look at the virtual clock. A pacer decides how much wall-clock
//! time one tick takes, which matters for interactive runs and nothing else.

use std::time::{Duration, Instant};

pub trait Pacer {
    /// Block until the next tick may begin.
    fn wait_tick(&mut self);
}

/// Ticks advance instantly.
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtualClock;

impl Pacer for VirtualClock {
    fn wait_tick(&mut self) {}
}

/// One tick per `period` of wall-clock time.
///
/// Deadlines are scheduled from the previous deadline rather than from wake-up, so time spent
/// printing or in the engine does not accumulate as drift.
#[derive(Debug, Clone)]
pub struct WallClockPacer {
    period: Duration,
    next_deadline: Option<Instant>,
}

impl WallClockPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_deadline: None,
        }
    }
}

impl Pacer for WallClockPacer {
    fn wait_tick(&mut self) {
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now) + self.period;
        if deadline > now {
            std::thread::sleep(deadline - now);
            self.next_deadline = Some(deadline);
        } else {
            // Fell behind by more than a period; restart the schedule instead of bursting.
            self.next_deadline = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_does_not_block() {
        let start = Instant::now();
        let mut clock = VirtualClock;
        for _ in 0..10_000 {
            clock.wait_tick();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn wall_clock_waits_roughly_one_period_per_tick() {
        let mut pacer = WallClockPacer::new(Duration::from_millis(5));
        let start = Instant::now();
        for _ in 0..4 {
            pacer.wait_tick();
        }
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}

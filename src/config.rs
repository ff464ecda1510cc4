//! Scheduler configuration and the policies that vary between simulator builds.

use crate::loader::LoadLimits;
use crate::priority::{Level, FIRST_USER_LEVEL, LOWEST_USER_LEVEL, MAX_LEVEL};
use crate::task::Tick;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Default inactivity limit before a ready task is terminated.
pub const DEFAULT_TIMEOUT_TICKS: Tick = 20;

/// Default loader truncation bound.
pub const DEFAULT_MAX_TASKS: usize = 200;

/// Where a task's timeout deadline is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeoutPolicy {
    /// `last_active_time + timeout_ticks`: running resets the clock.
    #[default]
    SinceLastActive,
    /// `arrival_time + timeout_ticks`: fixed at arrival.
    SinceArrival,
}

/// How far a user task can sink on quantum expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemotionPolicy {
    /// Stop at `floor`.
    Clamped { floor: Level },
    /// Keep sinking down to the configured `max_level`.
    Unbounded,
}

impl DemotionPolicy {
    pub fn floor(self) -> Option<Level> {
        match self {
            DemotionPolicy::Clamped { floor } => Some(floor),
            DemotionPolicy::Unbounded => None,
        }
    }
}

impl Default for DemotionPolicy {
    fn default() -> Self {
        DemotionPolicy::Clamped {
            floor: LOWEST_USER_LEVEL,
        }
    }
}

/// Order of tasks within one queue level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueueOrdering {
    /// Ascending `last_active_time`, ties by ascending id.
    #[default]
    ActivityOrdered,
    /// Append to the tail.
    Fifo,
}

/// Top-level scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub timeout_ticks: Tick,
    pub timeout_policy: TimeoutPolicy,
    pub demotion: DemotionPolicy,
    pub ordering: QueueOrdering,
    /// The idle phase gives up once the clock passes
    /// `last_arrival + timeout_ticks * stall_factor`.
    pub stall_factor: Tick,
    pub max_tasks: usize,
    /// Deepest queue level, at most [`MAX_LEVEL`]. Tasks loaded below it are rejected and
    /// demotion stops there.
    pub max_level: Level,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            timeout_policy: TimeoutPolicy::default(),
            demotion: DemotionPolicy::default(),
            ordering: QueueOrdering::default(),
            stall_factor: 1,
            max_tasks: DEFAULT_MAX_TASKS,
            max_level: MAX_LEVEL,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ticks == 0 {
            bail!("timeout must be at least one tick");
        }
        if self.stall_factor == 0 {
            bail!("stall factor must be at least 1");
        }
        if self.max_tasks == 0 {
            bail!("task limit must be at least 1");
        }
        if !(FIRST_USER_LEVEL..=MAX_LEVEL).contains(&self.max_level) {
            bail!(
                "deepest level {} outside {FIRST_USER_LEVEL}..={MAX_LEVEL}",
                self.max_level
            );
        }
        if let DemotionPolicy::Clamped { floor } = self.demotion {
            if floor < FIRST_USER_LEVEL {
                bail!("demotion floor {floor} would demote user tasks into the real-time level");
            }
            if floor > self.max_level {
                bail!("demotion floor {floor} is below the deepest level {}", self.max_level);
            }
        }
        Ok(())
    }

    /// Loader bounds matching what this configuration accepts.
    pub fn load_limits(&self) -> LoadLimits {
        LoadLimits {
            max_tasks: self.max_tasks,
            max_level: self.max_level.min(MAX_LEVEL),
        }
    }

    /// Level a demoted user task stops at.
    pub fn demotion_floor(&self) -> Level {
        self.demotion.floor().unwrap_or(self.max_level)
    }

    /// Deadline of a task under the configured timeout policy.
    pub fn timeout_deadline(&self, arrival_time: Tick, last_active_time: Tick) -> Tick {
        let base = match self.timeout_policy {
            TimeoutPolicy::SinceLastActive => last_active_time,
            TimeoutPolicy::SinceArrival => arrival_time,
        };
        base.saturating_add(self.timeout_ticks)
    }

    /// Last tick the idle phase keeps waiting for arrivals.
    pub fn idle_limit(&self, last_arrival: Tick) -> Tick {
        last_arrival.saturating_add(self.timeout_ticks.saturating_mul(self.stall_factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.demotion.floor(), Some(3));
        assert_eq!(config.ordering, QueueOrdering::ActivityOrdered);
    }

    #[test]
    fn rejects_degenerate_values() {
        let mut config = SchedulerConfig::default();
        config.timeout_ticks = 0;
        assert!(config.validate().is_err());

        let mut config = SchedulerConfig::default();
        config.demotion = DemotionPolicy::Clamped { floor: 0 };
        assert!(config.validate().is_err());

        let mut config = SchedulerConfig::default();
        config.stall_factor = 0;
        assert!(config.validate().is_err());

        let mut config = SchedulerConfig::default();
        config.max_level = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = SchedulerConfig::default();
        config.max_level = 2;
        assert!(config.validate().is_err(), "floor past the deepest level");
    }

    #[test]
    fn unbounded_demotion_stops_at_deepest_level() {
        let mut config = SchedulerConfig::default();
        assert_eq!(config.demotion_floor(), 3);
        config.demotion = DemotionPolicy::Unbounded;
        assert_eq!(config.demotion_floor(), MAX_LEVEL);
        config.max_level = 6;
        assert_eq!(config.demotion_floor(), 6);
    }

    #[test]
    fn deadline_follows_policy() {
        let mut config = SchedulerConfig::default();
        assert_eq!(config.timeout_deadline(2, 9), 29);
        config.timeout_policy = TimeoutPolicy::SinceArrival;
        assert_eq!(config.timeout_deadline(2, 9), 22);
    }

    #[test]
    fn idle_limit_scales_with_factor() {
        let mut config = SchedulerConfig::default();
        assert_eq!(config.idle_limit(5), 25);
        config.stall_factor = 3;
        assert_eq!(config.idle_limit(5), 65);
    }
}

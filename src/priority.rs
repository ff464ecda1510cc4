//! Priority classes, queue levels, and the per-class lookup table.
//!
//! The input file names a priority in `0..=3`: level 0 is the real-time class, levels 1-3 are the
//! user classes of the feedback queue. Once a user task starts being demoted its *level* can move
//! past 3, up to [`MAX_LEVEL`] (see [`crate::config::DemotionPolicy`]), so the queue set works
//! with raw [`Level`]s while reporting groups tasks by the [`PriorityClass`] they were loaded with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Numeric queue level. Lower values are served first; 0 is the real-time level.
pub type Level = u32;

/// Level reserved for real-time tasks.
pub const REALTIME_LEVEL: Level = 0;

/// Highest-precedence user level.
pub const FIRST_USER_LEVEL: Level = 1;

/// Lowest user level named in the input format; the default clamp floor for demotion.
pub const LOWEST_USER_LEVEL: Level = 3;

/// Deepest queue level. Loaded priorities and demotions never go past it.
pub const MAX_LEVEL: Level = 19;

/// Priority class a task was loaded with, ordered from most to least critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityClass {
    RealTime,
    High,
    Medium,
    Low,
}

impl PriorityClass {
    /// Ordered list of all classes (real-time first) for iteration utilities.
    pub const ALL: [PriorityClass; 4] = [
        PriorityClass::RealTime,
        PriorityClass::High,
        PriorityClass::Medium,
        PriorityClass::Low,
    ];

    /// Stable index for class based arrays.
    pub const fn index(self) -> usize {
        match self {
            PriorityClass::RealTime => 0,
            PriorityClass::High => 1,
            PriorityClass::Medium => 2,
            PriorityClass::Low => 3,
        }
    }

    /// Map a loaded priority level to its class.
    ///
    /// Levels above [`LOWEST_USER_LEVEL`] are accepted by the loader and land in `Low`.
    pub const fn from_level(level: Level) -> Self {
        match level {
            REALTIME_LEVEL => PriorityClass::RealTime,
            1 => PriorityClass::High,
            2 => PriorityClass::Medium,
            _ => PriorityClass::Low,
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriorityClass::RealTime => "real-time",
            PriorityClass::High => "high",
            PriorityClass::Medium => "medium",
            PriorityClass::Low => "low",
        };
        write!(f, "{label}")
    }
}

/// Helper structure wrapping a value per [`PriorityClass`].
///
/// Call sites iterate [`PriorityClass::ALL`] instead of hard-coding the four classes, so the table
/// follows along if a class is ever added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityTable<T> {
    values: Vec<T>,
}

impl<T> PriorityTable<T> {
    /// Build a table by executing a closure for each class, in [`PriorityClass::ALL`] order.
    pub fn from_fn(mut f: impl FnMut(PriorityClass) -> T) -> Self {
        let mut values = Vec::with_capacity(PriorityClass::ALL.len());
        for class in PriorityClass::ALL {
            values.push(f(class));
        }
        PriorityTable { values }
    }

    pub fn get(&self, class: PriorityClass) -> &T {
        &self.values[class.index()]
    }

    pub fn get_mut(&mut self, class: PriorityClass) -> &mut T {
        &mut self.values[class.index()]
    }

    /// Iterate `(class, value)` pairs in class order.
    pub fn iter(&self) -> impl Iterator<Item = (PriorityClass, &T)> {
        PriorityClass::ALL.into_iter().zip(self.values.iter())
    }
}

impl<T> Index<PriorityClass> for PriorityTable<T> {
    type Output = T;

    fn index(&self, index: PriorityClass) -> &Self::Output {
        self.get(index)
    }
}

impl<T> IndexMut<PriorityClass> for PriorityTable<T> {
    fn index_mut(&mut self, index: PriorityClass) -> &mut Self::Output {
        self.get_mut(index)
    }
}

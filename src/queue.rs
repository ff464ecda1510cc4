//! Per-level ready queues.
//!
//! One `VecDeque` per level gives O(1) pops from the head. The number of levels is fixed at
//! construction. Terminated tasks can still sit in a queue because termination (timeout) is decided
//! outside this component; they are discarded lazily the next time they reach the head of their
//! level.

use crate::config::QueueOrdering;
use crate::priority::Level;
use crate::task::{Task, TaskId, Tick};
use std::collections::VecDeque;

/// Queue entry. `last_active` is the task's activity stamp at insertion; a queued task does not
/// run, so the stamp stays accurate until the task is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueuedTask {
    id: TaskId,
    last_active: Tick,
}

impl QueuedTask {
    fn key(&self) -> (Tick, TaskId) {
        (self.last_active, self.id)
    }
}

/// Indexed set of ready queues, level 0 first.
#[derive(Debug, Clone)]
pub struct PriorityQueueSet {
    levels: Vec<VecDeque<QueuedTask>>,
    ordering: QueueOrdering,
    purged: u64,
}

impl PriorityQueueSet {
    /// Create a set of levels `0..=max_level`.
    pub fn new(max_level: Level, ordering: QueueOrdering) -> Self {
        Self {
            levels: (0..=max_level).map(|_| VecDeque::new()).collect(),
            ordering,
            purged: 0,
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Enqueue `task` at `level` according to the configured ordering.
    ///
    /// Returns `false`, leaving the set untouched, when `level` is past the deepest level.
    pub fn add(&mut self, level: Level, task: &Task) -> bool {
        let Some(queue) = self.levels.get_mut(level as usize) else {
            return false;
        };
        let entry = QueuedTask {
            id: task.id,
            last_active: task.last_active_time,
        };
        match self.ordering {
            QueueOrdering::Fifo => queue.push_back(entry),
            QueueOrdering::ActivityOrdered => {
                // First position whose key is greater: equal keys cannot occur since ids are unique.
                let position = queue.partition_point(|queued| queued.key() < entry.key());
                queue.insert(position, entry);
            }
        }
        true
    }

    /// Pop the head of `level`, first discarding any terminated tasks found there.
    ///
    /// `tasks` is the task table indexed by [`TaskId`].
    pub fn remove(&mut self, level: Level, tasks: &[Task]) -> Option<TaskId> {
        let queue = self.levels.get_mut(level as usize)?;
        while let Some(head) = queue.pop_front() {
            match tasks.get(head.id) {
                Some(task) if !task.is_terminated() => return Some(head.id),
                _ => self.purged += 1,
            }
        }
        None
    }

    pub fn is_empty(&self, level: Level) -> bool {
        self.levels
            .get(level as usize)
            .map_or(true, VecDeque::is_empty)
    }

    /// Lowest-numbered non-empty level.
    pub fn highest_non_empty(&self) -> Option<Level> {
        self.highest_non_empty_from(0)
    }

    /// Lowest-numbered non-empty level at or below `from` in precedence.
    pub fn highest_non_empty_from(&self, from: Level) -> Option<Level> {
        self.levels
            .iter()
            .enumerate()
            .skip(from as usize)
            .find(|(_, queue)| !queue.is_empty())
            .map(|(index, _)| index as Level)
    }

    /// Whether `id` is queued at any level.
    pub fn contains(&self, id: TaskId) -> bool {
        self.occurrences(id) > 0
    }

    /// Number of entries for `id` across all levels.
    pub fn occurrences(&self, id: TaskId) -> usize {
        self.levels
            .iter()
            .map(|queue| queue.iter().filter(|queued| queued.id == id).count())
            .sum()
    }

    /// Ids queued at `level`, head first.
    pub fn snapshot(&self, level: Level) -> Vec<TaskId> {
        self.levels
            .get(level as usize)
            .map(|queue| queue.iter().map(|queued| queued.id).collect())
            .unwrap_or_default()
    }

    /// Total terminated entries discarded by lazy purges so far.
    pub fn purged(&self) -> u64 {
        self.purged
    }
}

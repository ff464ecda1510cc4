//! Task records shared by the queue set, the sweeps, and the dispatch loop.

use crate::priority::{Level, PriorityClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of virtual time.
pub type Tick = u64;

/// Stable task identifier: the index of the task in load order.
pub type TaskId = usize;

/// Validated `(arrival_time, priority, burst_time)` record produced by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub arrival_time: Tick,
    pub priority: Level,
    pub burst_time: Tick,
}

impl TaskSpec {
    pub const fn new(arrival_time: Tick, priority: Level, burst_time: Tick) -> Self {
        Self {
            arrival_time,
            priority,
            burst_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Waiting,
    Ready,
    Running,
    Suspended,
    Terminated,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Waiting => "waiting",
            TaskState::Ready => "ready",
            TaskState::Running => "running",
            TaskState::Suspended => "suspended",
            TaskState::Terminated => "terminated",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskClass {
    RealTime,
    User,
}

impl fmt::Display for TaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskClass::RealTime => write!(f, "real-time"),
            TaskClass::User => write!(f, "user"),
        }
    }
}

/// Full scheduling state of one task.
///
/// Fields are public for inspection and reporting. The engine changes a task only through the
/// transition methods below, which keep `remaining_time + executed_time == burst_time` and are
/// no-ops once the task is [`TaskState::Terminated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub arrival_time: Tick,
    pub original_priority: Level,
    pub current_priority: Level,
    pub burst_time: Tick,
    pub remaining_time: Tick,
    pub executed_time: Tick,
    pub state: TaskState,
    /// Tick of the first dispatch.
    pub start_time: Option<Tick>,
    /// Tick of termination, normal or by timeout.
    pub completion_time: Option<Tick>,
    /// Tick of the last admission or execution; the sliding timeout is measured from here.
    pub last_active_time: Tick,
    pub timed_out: bool,
}

impl Task {
    /// Create a task in the `Waiting` state. The display name is 1-based.
    pub fn new(id: TaskId, spec: TaskSpec) -> Self {
        Self {
            id,
            name: format!("Task{}", id + 1),
            arrival_time: spec.arrival_time,
            original_priority: spec.priority,
            current_priority: spec.priority,
            burst_time: spec.burst_time,
            remaining_time: spec.burst_time,
            executed_time: 0,
            state: TaskState::Waiting,
            start_time: None,
            completion_time: None,
            last_active_time: spec.arrival_time,
            timed_out: false,
        }
    }

    pub fn class(&self) -> TaskClass {
        if self.original_priority == crate::priority::REALTIME_LEVEL {
            TaskClass::RealTime
        } else {
            TaskClass::User
        }
    }

    pub fn priority_class(&self) -> PriorityClass {
        PriorityClass::from_level(self.original_priority)
    }

    pub fn is_realtime(&self) -> bool {
        self.class() == TaskClass::RealTime
    }

    pub fn is_terminated(&self) -> bool {
        self.state == TaskState::Terminated
    }

    /// Terminated by running out of work rather than by timeout.
    pub fn completed_normally(&self) -> bool {
        self.is_terminated() && !self.timed_out
    }

    /// Waiting -> Ready at the arrival tick. Returns whether the transition happened.
    pub fn admit(&mut self, now: Tick) -> bool {
        if self.state != TaskState::Waiting || self.arrival_time != now {
            return false;
        }
        self.state = TaskState::Ready;
        self.last_active_time = now;
        true
    }

    /// Mark the task running. Returns `true` on its first dispatch.
    pub fn start(&mut self, now: Tick) -> bool {
        if self.is_terminated() {
            return false;
        }
        self.state = TaskState::Running;
        if self.start_time.is_none() {
            self.start_time = Some(now);
            true
        } else {
            false
        }
    }

    /// Consume one tick of work that finished at `now`. Returns the remaining time.
    pub fn execute_tick(&mut self, now: Tick) -> Tick {
        if self.is_terminated() || self.remaining_time == 0 {
            return self.remaining_time;
        }
        self.remaining_time -= 1;
        self.executed_time += 1;
        self.last_active_time = now;
        self.remaining_time
    }

    pub fn suspend(&mut self) {
        if !self.is_terminated() {
            self.state = TaskState::Suspended;
        }
    }

    pub fn resume(&mut self) {
        if !self.is_terminated() {
            self.state = TaskState::Ready;
        }
    }

    /// Move one level down, stopping at `floor`. A task already at or past `floor` stays put, and
    /// real-time tasks never move.
    pub fn demote(&mut self, floor: Level) {
        if self.is_terminated() || self.is_realtime() || self.current_priority >= floor {
            return;
        }
        self.current_priority += 1;
    }

    pub fn terminate(&mut self, now: Tick) {
        if self.is_terminated() {
            return;
        }
        self.state = TaskState::Terminated;
        self.completion_time = Some(now);
    }

    /// Terminate by timeout. The flag fires at most once.
    pub fn time_out(&mut self, now: Tick) -> bool {
        if self.is_terminated() || self.timed_out {
            return false;
        }
        self.timed_out = true;
        self.terminate(now);
        true
    }

    pub fn turnaround(&self) -> Option<Tick> {
        self.completion_time
            .map(|done| done.saturating_sub(self.arrival_time))
    }

    /// Turnaround minus burst, clamped at zero.
    pub fn waiting(&self) -> Option<Tick> {
        self.turnaround()
            .map(|turnaround| turnaround.saturating_sub(self.burst_time))
    }

    pub fn response(&self) -> Option<Tick> {
        self.start_time
            .map(|start| start.saturating_sub(self.arrival_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(priority: Level, burst: Tick) -> Task {
        Task::new(0, TaskSpec::new(0, priority, burst))
    }

    #[test]
    fn new_task_is_waiting_with_full_budget() {
        let task = Task::new(4, TaskSpec::new(3, 2, 7));
        assert_eq!(task.name, "Task5");
        assert_eq!(task.state, TaskState::Waiting);
        assert_eq!(task.remaining_time, 7);
        assert_eq!(task.start_time, None);
        assert_eq!(task.class(), TaskClass::User);
        assert_eq!(task.priority_class(), PriorityClass::Medium);
    }

    #[test]
    fn admit_only_at_arrival_tick() {
        let mut task = Task::new(0, TaskSpec::new(5, 1, 2));
        assert!(!task.admit(4));
        assert!(task.admit(5));
        assert!(!task.admit(5));
        assert_eq!(task.state, TaskState::Ready);
    }

    #[test]
    fn execute_keeps_work_conserved() {
        let mut task = user(1, 3);
        task.start(0);
        for now in 1..=3 {
            task.execute_tick(now);
            assert_eq!(task.remaining_time + task.executed_time, task.burst_time);
        }
        assert_eq!(task.remaining_time, 0);
        assert_eq!(task.execute_tick(4), 0);
        assert_eq!(task.executed_time, 3);
        assert_eq!(task.last_active_time, 3);
    }

    #[test]
    fn start_records_first_dispatch_only() {
        let mut task = user(1, 3);
        assert!(task.start(2));
        assert!(!task.start(5));
        assert_eq!(task.start_time, Some(2));
    }

    #[test]
    fn demotion_respects_floor_and_skips_realtime() {
        let mut task = user(2, 10);
        task.demote(3);
        task.demote(3);
        assert_eq!(task.current_priority, 3);

        let mut deep = user(2, 10);
        deep.demote(19);
        deep.demote(19);
        assert_eq!(deep.current_priority, 4);

        let mut rt = Task::new(0, TaskSpec::new(0, 0, 4));
        rt.demote(19);
        assert_eq!(rt.current_priority, 0);
    }

    #[test]
    fn loaded_below_floor_is_not_promoted() {
        let mut task = user(5, 10);
        task.demote(3);
        assert_eq!(task.current_priority, 5);
    }

    #[test]
    fn terminated_is_absorbing() {
        let mut task = user(1, 4);
        task.start(0);
        task.execute_tick(1);
        assert!(task.time_out(3));
        assert!(!task.time_out(4));
        task.execute_tick(5);
        task.demote(19);
        task.resume();
        task.terminate(9);
        assert_eq!(task.state, TaskState::Terminated);
        assert_eq!(task.remaining_time, 3);
        assert_eq!(task.current_priority, 1);
        assert_eq!(task.completion_time, Some(3));
        assert!(!task.completed_normally());
    }

    #[test]
    fn metrics_derive_from_times() {
        let mut task = Task::new(0, TaskSpec::new(2, 1, 3));
        task.admit(2);
        task.start(4);
        task.terminate(9);
        assert_eq!(task.turnaround(), Some(7));
        assert_eq!(task.waiting(), Some(4));
        assert_eq!(task.response(), Some(2));
    }
}

//! Scheduling engine.
//!
//! [`Scheduler`] owns the whole simulation state: the task table, the ready queues, the virtual
//! clock, and the counters. Nothing is global, so independent runs (tests, benches, the binary)
//! never interfere.
//!
//! - [`sweep`]: arrival and timeout passes over the task table.
//! - [`dispatch`]: the tick loop (real-time phase, feedback-queue phase, idle phase).

pub mod dispatch;
pub mod sweep;

pub use dispatch::{RunOutcome, Step};

use crate::config::SchedulerConfig;
use crate::metrics::Report;
use crate::pacer::{Pacer, VirtualClock};
use crate::priority::REALTIME_LEVEL;
use crate::queue::PriorityQueueSet;
use crate::task::{Task, TaskId, TaskSpec, TaskState, Tick};
use crate::trace::{EventKind, NullSink, TraceEvent, TraceSink};
use anyhow::{bail, ensure, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single owner of the simulation state.
pub struct Scheduler {
    config: SchedulerConfig,
    tasks: Vec<Task>,
    queues: PriorityQueueSet,
    /// Virtual clock.
    now: Tick,
    /// Tasks that reached `Terminated`, by completion or by timeout.
    terminated: usize,
    context_switches: u64,
    last_arrival: Tick,
    /// Initial sweep at tick 0 has run.
    primed: bool,
    /// Cleared from outside to request a stop.
    running: Arc<AtomicBool>,
    pacer: Box<dyn Pacer + Send>,
    sink: Box<dyn TraceSink + Send>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("tasks", &self.tasks)
            .field("queues", &self.queues)
            .field("now", &self.now)
            .field("terminated", &self.terminated)
            .field("context_switches", &self.context_switches)
            .field("last_arrival", &self.last_arrival)
            .field("primed", &self.primed)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Build a scheduler over a validated task table.
    ///
    /// Tasks get ids in input order. Input past `config.max_tasks` is dropped; a priority deeper
    /// than `config.max_level` is an error.
    pub fn new(specs: &[TaskSpec], config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        if specs.is_empty() {
            bail!("no tasks to schedule");
        }
        if let Some((index, _)) = specs.iter().enumerate().find(|(_, s)| s.burst_time == 0) {
            bail!("task {index} has a zero burst time");
        }
        if let Some((index, spec)) = specs
            .iter()
            .enumerate()
            .find(|(_, s)| s.priority > config.max_level)
        {
            bail!(
                "task {index} has priority {} past the deepest level {}",
                spec.priority,
                config.max_level
            );
        }
        if specs.len() > config.max_tasks {
            log::warn!(
                "task table holds {} entries, keeping the first {}",
                specs.len(),
                config.max_tasks
            );
        }

        let tasks: Vec<Task> = specs
            .iter()
            .take(config.max_tasks)
            .enumerate()
            .map(|(id, spec)| Task::new(id, *spec))
            .collect();
        let last_arrival = tasks.iter().map(|t| t.arrival_time).max().unwrap_or(0);
        let queues = PriorityQueueSet::new(config.max_level, config.ordering);

        Ok(Self {
            config,
            tasks,
            queues,
            now: 0,
            terminated: 0,
            context_switches: 0,
            last_arrival,
            primed: false,
            running: Arc::new(AtomicBool::new(true)),
            pacer: Box::new(VirtualClock),
            sink: Box::new(NullSink),
        })
    }

    pub fn with_sink(mut self, sink: impl TraceSink + Send + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_pacer(mut self, pacer: impl Pacer + Send + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    /// Share an externally owned running flag; clearing it stops the run.
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Handle that stops the run when set to `false`.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn queues(&self) -> &PriorityQueueSet {
        &self.queues
    }

    /// Current virtual tick.
    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn context_switches(&self) -> u64 {
        self.context_switches
    }

    /// Tasks terminated so far, timeouts included.
    pub fn terminated_count(&self) -> usize {
        self.terminated
    }

    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn last_arrival(&self) -> Tick {
        self.last_arrival
    }

    pub fn all_terminated(&self) -> bool {
        self.terminated >= self.tasks.len()
    }

    /// Statistics over the current task table.
    pub fn report(&self) -> Report {
        Report::from_tasks(&self.tasks, self.now, self.context_switches)
    }

    /// Check the structural invariants of the current state.
    ///
    /// Between steps no task is running, work is conserved, and every ready task sits in exactly
    /// one queue at its current level.
    pub fn verify_invariants(&self) -> Result<()> {
        for task in &self.tasks {
            ensure!(
                task.remaining_time + task.executed_time == task.burst_time,
                "task {} lost work: remaining {} + executed {} != burst {}",
                task.id,
                task.remaining_time,
                task.executed_time,
                task.burst_time
            );
            ensure!(
                task.state != TaskState::Running,
                "task {} left running between steps",
                task.id
            );
            if task.is_realtime() {
                ensure!(
                    task.current_priority == REALTIME_LEVEL,
                    "real-time task {} changed level",
                    task.id
                );
            } else {
                ensure!(
                    task.current_priority >= task.original_priority,
                    "user task {} was promoted",
                    task.id
                );
            }
            ensure!(
                (task.current_priority as usize) < self.queues.level_count(),
                "task {} at level {} past the deepest queue",
                task.id,
                task.current_priority
            );
            let queued = self.queues.occurrences(task.id);
            match task.state {
                TaskState::Ready => {
                    ensure!(queued == 1, "ready task {} queued {} times", task.id, queued);
                    ensure!(
                        self.queues
                            .snapshot(task.current_priority)
                            .contains(&task.id),
                        "ready task {} not at its level {}",
                        task.id,
                        task.current_priority
                    );
                }
                TaskState::Terminated => {
                    ensure!(queued <= 1, "terminated task {} queued {} times", task.id, queued)
                }
                _ => ensure!(queued == 0, "{} task {} is queued", task.state, task.id),
            }
        }
        let terminated = self.tasks.iter().filter(|t| t.is_terminated()).count();
        ensure!(
            terminated == self.terminated,
            "terminated counter {} disagrees with task table {}",
            self.terminated,
            terminated
        );
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Wait for the pacer, then move the virtual clock forward one tick.
    fn advance_tick(&mut self) {
        self.pacer.wait_tick();
        self.now += 1;
    }

    fn emit(&mut self, id: TaskId, kind: EventKind) {
        let event = TraceEvent::of(&self.tasks[id], self.now, kind);
        self.sink.record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_table() {
        assert!(Scheduler::new(&[], SchedulerConfig::default()).is_err());
    }

    #[test]
    fn rejects_zero_burst() {
        let specs = [TaskSpec::new(0, 1, 2), TaskSpec::new(1, 1, 0)];
        assert!(Scheduler::new(&specs, SchedulerConfig::default()).is_err());
    }

    #[test]
    fn rejects_priority_past_deepest_level() {
        let specs = [TaskSpec::new(0, 1, 2), TaskSpec::new(0, u32::MAX, 1)];
        let err = Scheduler::new(&specs, SchedulerConfig::default()).err().unwrap();
        assert!(err.to_string().contains("task 1"), "{err}");

        let config = SchedulerConfig {
            max_level: 5,
            ..SchedulerConfig::default()
        };
        assert!(Scheduler::new(&[TaskSpec::new(0, 6, 1)], config.clone()).is_err());
        let scheduler = Scheduler::new(&[TaskSpec::new(0, 5, 1)], config).unwrap();
        assert_eq!(scheduler.queues().level_count(), 6);
    }

    #[test]
    fn truncates_to_task_limit() {
        let specs = vec![TaskSpec::new(0, 1, 1); 5];
        let config = SchedulerConfig {
            max_tasks: 3,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(&specs, config).unwrap();
        assert_eq!(scheduler.total_tasks(), 3);
    }

    #[test]
    fn fresh_scheduler_is_consistent() {
        let specs = [TaskSpec::new(4, 0, 2), TaskSpec::new(9, 2, 3)];
        let scheduler = Scheduler::new(&specs, SchedulerConfig::default()).unwrap();
        assert_eq!(scheduler.now(), 0);
        assert_eq!(scheduler.last_arrival(), 9);
        assert!(scheduler.tasks().iter().all(|t| t.state == TaskState::Waiting));
        scheduler.verify_invariants().unwrap();
    }
}

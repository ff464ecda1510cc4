//! Tick loop.
//!
//! Each step:
//! 1. Timeout pass.
//! 2. Real-time phase: the head of level 0 runs to completion, one tick at a time, with arrivals
//!    and other tasks' timeouts processed between ticks. It is never preempted.
//! 3. Feedback-queue phase: the head of the highest non-empty user level runs for one quantum
//!    (one tick). Unfinished tasks are demoted and re-queued. If that level held only timed-out
//!    tasks, the purge empties it and nothing runs this step.
//! 4. Idle phase: nothing ran. Finish when every task is terminated, otherwise advance the clock.
//!    Give up once no arrival is possible and the queues are empty.
//!
//! A dispatch already advanced the clock, so steps 2 and 3 end the step without idling.

use super::Scheduler;
use crate::priority::{FIRST_USER_LEVEL, REALTIME_LEVEL};
use crate::task::TaskId;
use crate::trace::EventKind;
use serde::{Deserialize, Serialize};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Every task terminated.
    Completed,
    /// Nothing runnable and no arrival can still happen; the remaining tasks never finish.
    Stalled,
    /// The running flag was cleared.
    Interrupted,
}

/// Result of a single [`Scheduler::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A real-time task ran to completion.
    RealTime(TaskId),
    /// A user task ran for one quantum.
    User(TaskId),
    /// Nothing was runnable; the clock moved one tick.
    Idle,
    Finished(RunOutcome),
}

enum Phase {
    Ran(TaskId),
    Nothing,
    Interrupted,
}

impl Scheduler {
    /// Run until every task terminates, the run stalls, or a stop is requested.
    pub fn run(&mut self) -> RunOutcome {
        log::info!(
            "starting run: {} tasks, last arrival at tick {}",
            self.tasks.len(),
            self.last_arrival
        );
        let outcome = loop {
            if let Step::Finished(outcome) = self.step() {
                break outcome;
            }
        };
        log::info!(
            "run {:?} at tick {}: {}/{} terminated, {} context switches",
            outcome,
            self.now,
            self.terminated,
            self.tasks.len(),
            self.context_switches
        );
        log::debug!("{} stale queue entries purged", self.queues.purged());
        outcome
    }

    /// Execute one iteration of the tick loop.
    pub fn step(&mut self) -> Step {
        if !self.primed {
            self.primed = true;
            self.sweep();
        }
        if !self.is_running() {
            return Step::Finished(RunOutcome::Interrupted);
        }

        self.expire_timeouts();

        match self.dispatch_realtime() {
            Phase::Ran(id) => return Step::RealTime(id),
            Phase::Interrupted => return Step::Finished(RunOutcome::Interrupted),
            Phase::Nothing => {}
        }

        if let Phase::Ran(id) = self.dispatch_user() {
            return Step::User(id);
        }

        if self.all_terminated() {
            return Step::Finished(RunOutcome::Completed);
        }
        let limit = self.config.idle_limit(self.last_arrival);
        if self.now > limit && self.queues.highest_non_empty().is_none() {
            log::warn!(
                "idle past tick {limit} with {} of {} tasks unfinished; giving up",
                self.tasks.len() - self.terminated,
                self.tasks.len()
            );
            return Step::Finished(RunOutcome::Stalled);
        }
        self.advance_tick();
        self.sweep();
        Step::Idle
    }

    fn dispatch_realtime(&mut self) -> Phase {
        let Some(id) = self.queues.remove(REALTIME_LEVEL, &self.tasks) else {
            return Phase::Nothing;
        };
        let first_run = self.tasks[id].start(self.now);
        log::debug!("tick {}: real-time task {id} dispatched", self.now);
        self.emit(id, if first_run { EventKind::Started } else { EventKind::Continued });

        while self.tasks[id].remaining_time > 0 {
            if !self.is_running() {
                self.park_interrupted(id);
                return Phase::Interrupted;
            }
            self.advance_tick();
            self.tasks[id].execute_tick(self.now);
            self.admit_arrivals();
            if self.tasks[id].remaining_time > 0 {
                self.emit(id, EventKind::Running);
                self.expire_timeouts();
            }
        }

        self.tasks[id].terminate(self.now);
        self.terminated += 1;
        self.emit(id, EventKind::Terminated);
        self.expire_timeouts();
        self.context_switches += 1;
        Phase::Ran(id)
    }

    fn dispatch_user(&mut self) -> Phase {
        let Some(level) = self.queues.highest_non_empty_from(FIRST_USER_LEVEL) else {
            return Phase::Nothing;
        };
        let Some(id) = self.queues.remove(level, &self.tasks) else {
            log::debug!("tick {}: level {level} held only terminated tasks", self.now);
            return Phase::Nothing;
        };
        let first_run = self.tasks[id].start(self.now);
        log::debug!("tick {}: user task {id} dispatched from level {level}", self.now);
        self.emit(id, if first_run { EventKind::Started } else { EventKind::Continued });

        self.advance_tick();
        self.tasks[id].execute_tick(self.now);
        self.admit_arrivals();
        self.expire_timeouts();

        if self.tasks[id].remaining_time == 0 {
            self.tasks[id].terminate(self.now);
            self.terminated += 1;
            self.emit(id, EventKind::Terminated);
        } else {
            let floor = self.config.demotion_floor();
            let task = &mut self.tasks[id];
            task.suspend();
            task.demote(floor);
            let new_level = task.current_priority;
            log::debug!("tick {}: task {id} demoted {level} -> {new_level}", self.now);
            self.emit(id, EventKind::Suspended);
            self.tasks[id].resume();
            self.queues.add(new_level, &self.tasks[id]);
        }
        self.context_switches += 1;
        Phase::Ran(id)
    }

    /// Put a real-time task cut short by a stop request back at the real-time level.
    fn park_interrupted(&mut self, id: TaskId) {
        log::info!(
            "tick {}: stop requested, parking real-time task {id} with {} ticks left",
            self.now,
            self.tasks[id].remaining_time
        );
        self.tasks[id].suspend();
        self.emit(id, EventKind::Suspended);
        self.tasks[id].resume();
        self.queues.add(REALTIME_LEVEL, &self.tasks[id]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::task::{TaskSpec, TaskState};
    use crate::trace::TraceRecorder;
    use std::sync::atomic::Ordering;

    fn scheduler(specs: &[TaskSpec]) -> (Scheduler, TraceRecorder) {
        let recorder = TraceRecorder::new();
        let scheduler = Scheduler::new(specs, SchedulerConfig::default())
            .unwrap()
            .with_sink(recorder.clone());
        (scheduler, recorder)
    }

    #[test]
    fn realtime_step_runs_to_completion() {
        let (mut scheduler, _) = scheduler(&[TaskSpec::new(0, 0, 3)]);
        assert_eq!(scheduler.step(), Step::RealTime(0));
        assert_eq!(scheduler.now(), 3);
        assert_eq!(scheduler.tasks()[0].completion_time, Some(3));
        assert_eq!(scheduler.step(), Step::Finished(RunOutcome::Completed));
    }

    #[test]
    fn user_step_runs_one_quantum_and_demotes() {
        let (mut scheduler, _) = scheduler(&[TaskSpec::new(0, 1, 4)]);
        assert_eq!(scheduler.step(), Step::User(0));
        let task = &scheduler.tasks()[0];
        assert_eq!(task.current_priority, 2);
        assert_eq!(task.state, TaskState::Ready);
        assert_eq!(scheduler.queues().snapshot(2), vec![0]);
        scheduler.verify_invariants().unwrap();
    }

    #[test]
    fn idle_steps_wait_for_late_arrival() {
        let (mut scheduler, _) = scheduler(&[TaskSpec::new(3, 1, 1)]);
        assert_eq!(scheduler.step(), Step::Idle);
        assert_eq!(scheduler.step(), Step::Idle);
        assert_eq!(scheduler.step(), Step::Idle);
        assert_eq!(scheduler.now(), 3);
        assert_eq!(scheduler.step(), Step::User(0));
        assert_eq!(scheduler.run(), RunOutcome::Completed);
    }

    #[test]
    fn stale_level_costs_an_idle_tick() {
        let (mut scheduler, _) = scheduler(&[TaskSpec::new(0, 1, 5), TaskSpec::new(0, 2, 5)]);
        scheduler.sweep();
        scheduler.tasks[0].time_out(0);
        scheduler.terminated += 1;

        // Level 1 holds only the timed-out task: no dispatch from level 2 this step.
        assert_eq!(scheduler.step(), Step::Idle);
        assert_eq!(scheduler.now(), 1);
        assert!(scheduler.queues().is_empty(1));
        scheduler.verify_invariants().unwrap();
        assert_eq!(scheduler.step(), Step::User(1));
    }

    #[test]
    fn missed_arrival_stalls_after_idle_limit() {
        let (mut scheduler, _) = scheduler(&[TaskSpec::new(0, 1, 1)]);
        // Arrival tick already behind the clock: the task can never be admitted.
        scheduler.now = 5;
        assert_eq!(scheduler.run(), RunOutcome::Stalled);
        assert_eq!(scheduler.now(), 21);
        assert_eq!(scheduler.tasks()[0].state, TaskState::Waiting);
    }

    #[test]
    fn stop_before_start_leaves_tasks_untouched() {
        let (mut scheduler, _) = scheduler(&[TaskSpec::new(0, 0, 5)]);
        scheduler.stop_flag().store(false, Ordering::Relaxed);
        assert_eq!(scheduler.run(), RunOutcome::Interrupted);
        assert_eq!(scheduler.tasks()[0].executed_time, 0);
        assert_eq!(scheduler.tasks()[0].state, TaskState::Ready);
    }

    #[test]
    fn stop_mid_realtime_parks_the_task() {
        struct StopAfter {
            ticks: u32,
            flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
        }
        impl crate::pacer::Pacer for StopAfter {
            fn wait_tick(&mut self) {
                self.ticks = self.ticks.saturating_sub(1);
                if self.ticks == 0 {
                    self.flag.store(false, Ordering::Relaxed);
                }
            }
        }

        let (scheduler, recorder) = scheduler(&[TaskSpec::new(0, 0, 10)]);
        let flag = scheduler.stop_flag();
        let mut scheduler = scheduler.with_pacer(StopAfter { ticks: 2, flag });

        assert_eq!(scheduler.run(), RunOutcome::Interrupted);
        let task = &scheduler.tasks()[0];
        assert_eq!(task.executed_time, 2);
        assert_eq!(task.state, TaskState::Ready);
        assert_eq!(scheduler.queues().snapshot(0), vec![0]);
        assert_eq!(recorder.events().last().map(|e| e.kind), Some(EventKind::Suspended));
        scheduler.verify_invariants().unwrap();
    }
}

//! Arrival and timeout passes.
//!
//! Both passes scan the whole task table and only act on tasks whose state qualifies, so running
//! either twice at the same tick is a no-op the second time.

use super::Scheduler;
use crate::task::TaskState;
use crate::trace::EventKind;

impl Scheduler {
    /// Admit every waiting task whose arrival tick is now. Returns how many were admitted.
    pub fn admit_arrivals(&mut self) -> usize {
        let now = self.now;
        let mut admitted = 0;
        for id in 0..self.tasks.len() {
            if !self.tasks[id].admit(now) {
                continue;
            }
            let level = self.tasks[id].current_priority;
            self.queues.add(level, &self.tasks[id]);
            log::debug!("tick {now}: task {id} arrived at level {level}");
            self.emit(id, EventKind::Arrived);
            admitted += 1;
        }
        admitted
    }

    /// Terminate every ready task whose timeout deadline has passed. Returns how many expired.
    ///
    /// Waiting tasks have not arrived and the running task is mid-quantum; neither can time out.
    /// Expired tasks stay in their queue until a removal purges them.
    pub fn expire_timeouts(&mut self) -> usize {
        let now = self.now;
        let mut expired = 0;
        for id in 0..self.tasks.len() {
            let task = &self.tasks[id];
            if task.is_terminated()
                || task.timed_out
                || matches!(task.state, TaskState::Waiting | TaskState::Running)
            {
                continue;
            }
            let deadline = self
                .config
                .timeout_deadline(task.arrival_time, task.last_active_time);
            if now < deadline {
                continue;
            }
            if self.tasks[id].time_out(now) {
                self.terminated += 1;
                log::info!(
                    "tick {now}: task {id} timed out (deadline {deadline}, {} ticks left)",
                    self.tasks[id].remaining_time
                );
                self.emit(id, EventKind::TimedOut);
                expired += 1;
            }
        }
        expired
    }

    /// Arrival pass followed by timeout pass.
    pub fn sweep(&mut self) {
        self.admit_arrivals();
        self.expire_timeouts();
    }
}

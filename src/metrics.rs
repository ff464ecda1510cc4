//! End-of-run statistics.
//!
//! [`Report::from_tasks`] is a pure read over the task table. Turnaround, waiting, and response
//! times only count tasks that ran out of work; timed-out tasks are counted separately and
//! contribute nothing to the means.

use crate::priority::{PriorityClass, PriorityTable};
use crate::task::{Task, TaskClass, TaskId, TaskState, Tick};
use serde::Serialize;
use std::fmt;

/// One row of the per-task table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub name: String,
    pub class: TaskClass,
    pub arrival_time: Tick,
    pub burst_time: Tick,
    pub executed_time: Tick,
    pub start_time: Option<Tick>,
    pub completion_time: Option<Tick>,
    pub final_priority: u32,
    /// Present only for tasks that completed normally.
    pub turnaround: Option<Tick>,
    pub waiting: Option<Tick>,
    pub response: Option<Tick>,
    pub state: TaskState,
    pub timed_out: bool,
}

impl TaskSummary {
    fn of(task: &Task) -> Self {
        let completed = task.completed_normally();
        Self {
            id: task.id,
            name: task.name.clone(),
            class: task.class(),
            arrival_time: task.arrival_time,
            burst_time: task.burst_time,
            executed_time: task.executed_time,
            start_time: task.start_time,
            completion_time: task.completion_time,
            final_priority: task.current_priority,
            turnaround: task.turnaround().filter(|_| completed),
            waiting: task.waiting().filter(|_| completed),
            response: task.response().filter(|_| completed),
            state: task.state,
            timed_out: task.timed_out,
        }
    }
}

/// Outcome counts for one loaded priority class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassSummary {
    pub total: usize,
    pub completed: usize,
    pub timed_out: usize,
    pub mean_waiting: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub ticks_elapsed: Tick,
    pub total_tasks: usize,
    /// Terminated by running out of work.
    pub completed: usize,
    pub timed_out: usize,
    /// Neither completed nor timed out (stalled or interrupted runs).
    pub unfinished: usize,
    pub realtime_completed: usize,
    pub user_completed: usize,
    pub context_switches: u64,
    pub mean_turnaround: Option<f64>,
    pub mean_waiting: Option<f64>,
    pub mean_response: Option<f64>,
    /// Completed burst time over elapsed ticks, in `[0, 1]`.
    pub cpu_utilization: f64,
    /// Completed tasks per tick.
    pub throughput: f64,
    pub by_class: PriorityTable<ClassSummary>,
    pub tasks: Vec<TaskSummary>,
}

impl Report {
    pub fn from_tasks(tasks: &[Task], ticks_elapsed: Tick, context_switches: u64) -> Self {
        let completed: Vec<&Task> = tasks.iter().filter(|t| t.completed_normally()).collect();
        let timed_out = tasks.iter().filter(|t| t.timed_out).count();
        let realtime_completed = completed.iter().filter(|t| t.is_realtime()).count();
        let completed_burst: Tick = completed.iter().map(|t| t.burst_time).sum();

        let (cpu_utilization, throughput) = if ticks_elapsed > 0 {
            (
                completed_burst as f64 / ticks_elapsed as f64,
                completed.len() as f64 / ticks_elapsed as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let by_class = PriorityTable::from_fn(|class| class_summary(tasks, class));

        Self {
            ticks_elapsed,
            total_tasks: tasks.len(),
            completed: completed.len(),
            timed_out,
            unfinished: tasks.len() - completed.len() - timed_out,
            realtime_completed,
            user_completed: completed.len() - realtime_completed,
            context_switches,
            mean_turnaround: mean(completed.iter().filter_map(|t| t.turnaround())),
            mean_waiting: mean(completed.iter().filter_map(|t| t.waiting())),
            mean_response: mean(completed.iter().filter_map(|t| t.response())),
            cpu_utilization,
            throughput,
            by_class,
            tasks: tasks.iter().map(TaskSummary::of).collect(),
        }
    }
}

fn class_summary(tasks: &[Task], class: PriorityClass) -> ClassSummary {
    let members: Vec<&Task> = tasks.iter().filter(|t| t.priority_class() == class).collect();
    ClassSummary {
        total: members.len(),
        completed: members.iter().filter(|t| t.completed_normally()).count(),
        timed_out: members.iter().filter(|t| t.timed_out).count(),
        mean_waiting: mean(
            members
                .iter()
                .filter(|t| t.completed_normally())
                .filter_map(|t| t.waiting()),
        ),
    }
}

/// Arithmetic mean, `None` for an empty sample.
fn mean(values: impl Iterator<Item = Tick>) -> Option<f64> {
    let (sum, count) = values.fold((0u64, 0u64), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

fn opt(value: Option<Tick>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn opt_mean(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=<80}", "")?;
        writeln!(f, "{:^80}", "SIMULATION STATISTICS")?;
        writeln!(f, "{:=<80}", "")?;
        writeln!(
            f,
            "{:<6} {:<10} {:<8} {:<8} {:<8} {:<8} {:<8} {:<12}",
            "ID", "CLASS", "ARRIVAL", "BURST", "START", "END", "WAIT", "STATE"
        )?;
        writeln!(f, "{:-<80}", "")?;
        for row in &self.tasks {
            let state = if row.timed_out {
                "timed-out".to_string()
            } else {
                row.state.to_string()
            };
            writeln!(
                f,
                "{:<6} {:<10} {:<8} {:<8} {:<8} {:<8} {:<8} {:<12}",
                row.id,
                row.class.to_string(),
                row.arrival_time,
                row.burst_time,
                opt(row.start_time),
                opt(row.completion_time),
                opt(row.waiting),
                state
            )?;
        }
        writeln!(f, "{:-<80}", "")?;
        writeln!(f, "  Ticks elapsed        : {}", self.ticks_elapsed)?;
        writeln!(f, "  Total tasks          : {}", self.total_tasks)?;
        writeln!(f, "  Completed            : {}", self.completed)?;
        writeln!(f, "  Timed out            : {}", self.timed_out)?;
        if self.unfinished > 0 {
            writeln!(f, "  Unfinished           : {}", self.unfinished)?;
        }
        writeln!(f, "  Real-time completed  : {}", self.realtime_completed)?;
        writeln!(f, "  User completed       : {}", self.user_completed)?;
        writeln!(f, "  Context switches     : {}", self.context_switches)?;
        for (class, summary) in self.by_class.iter() {
            if summary.total > 0 {
                writeln!(
                    f,
                    "  {:<20} : {} total, {} completed, {} timed out",
                    format!("{class} class"),
                    summary.total,
                    summary.completed,
                    summary.timed_out
                )?;
            }
        }
        if self.completed > 0 {
            writeln!(f, "  Mean turnaround      : {}", opt_mean(self.mean_turnaround))?;
            writeln!(f, "  Mean waiting         : {}", opt_mean(self.mean_waiting))?;
            writeln!(f, "  Mean response        : {}", opt_mean(self.mean_response))?;
            writeln!(f, "  CPU utilization      : {:.1}%", self.cpu_utilization * 100.0)?;
            writeln!(f, "  Throughput           : {:.2} tasks/tick", self.throughput)?;
        }
        write!(f, "{:=<80}", "")
    }
}

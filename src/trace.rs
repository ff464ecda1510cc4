//! Scheduling trace: the per-event output stream of a run.
//!
//! The engine hands every event to a [`TraceSink`]. Rendering is left to the receiver, so the same
//! run can feed a terminal printer, a JSON writer, or a test assertion.

use crate::priority::Level;
use crate::task::{Task, TaskId, Tick};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Arrived,
    /// First dispatch of a task.
    Started,
    /// A real-time task still has work after a tick.
    Running,
    /// A user task is dispatched again after a quantum expiry.
    Continued,
    Suspended,
    TimedOut,
    Terminated,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Arrived => "arrived",
            EventKind::Started => "started",
            EventKind::Running => "running",
            EventKind::Continued => "continued",
            EventKind::Suspended => "suspended",
            EventKind::TimedOut => "timed-out",
            EventKind::Terminated => "terminated",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub tick: Tick,
    pub task_id: TaskId,
    /// Current priority level at the time of the event.
    pub priority: Level,
    pub remaining: Tick,
    pub kind: EventKind,
}

impl TraceEvent {
    pub fn of(task: &Task, tick: Tick, kind: EventKind) -> Self {
        Self {
            tick,
            task_id: task.id,
            priority: task.current_priority,
            remaining: task.remaining_time,
            kind,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>8.4} s  task {:<10} (id:{:04}  priority:{}  remaining:{} s)",
            self.tick as f64, self.kind, self.task_id, self.priority, self.remaining
        )
    }
}

/// Receiver of trace events.
pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn record(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Cloneable in-memory sink. Clones share one buffer, so a handle kept outside the scheduler can
/// read what the scheduler thread recorded.
#[derive(Debug, Default, Clone)]
pub struct TraceRecorder {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drain the buffer, leaving it empty.
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl TraceSink for TraceRecorder {
    fn record(&mut self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}

/// Forwards events over a crossbeam channel to a consumer thread.
///
/// A disconnected receiver is ignored: the run must not depend on anyone listening.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<TraceEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<TraceEvent>) -> Self {
        Self { sender }
    }
}

impl TraceSink for ChannelSink {
    fn record(&mut self, event: TraceEvent) {
        let _ = self.sender.send(event);
    }
}

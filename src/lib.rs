//! Tick-driven simulator of a four-tier task scheduler.
//!
//! Tier 0 is a real-time class served first come, first served and run to completion. Tiers 1 to 3
//! form a multi-level feedback queue with a one-tick quantum and demotion on quantum expiry.
//! Ready tasks that stay inactive too long are terminated by timeout.

pub mod config;
pub mod loader;
pub mod metrics;
pub mod pacer;
pub mod priority;
pub mod queue;
pub mod scheduler;
pub mod simulation;
pub mod task;
pub mod threading;
pub mod trace;

// Re-export for easier testing
pub use config::{DemotionPolicy, QueueOrdering, SchedulerConfig, TimeoutPolicy};
pub use metrics::Report;
pub use scheduler::{RunOutcome, Scheduler, Step};
pub use simulation::{Simulation, SimulationConfig, SimulationResult};
pub use task::{Task, TaskSpec, TaskState};
pub use trace::{EventKind, TraceEvent, TraceRecorder, TraceSink};

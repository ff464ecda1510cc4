//! Host orchestration: build a [`Scheduler`] from loaded specs and run it, inline or on a dedicated
//! thread, under a shared running flag.

use crate::config::SchedulerConfig;
use crate::metrics::Report;
use crate::pacer::WallClockPacer;
use crate::scheduler::{RunOutcome, Scheduler};
use crate::task::TaskSpec;
use crate::threading::set_thread_priority;
use crate::trace::TraceSink;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationConfig {
    pub scheduler: SchedulerConfig,
    /// Wall-clock length of one tick. `None` runs on the virtual clock.
    pub tick_period: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub outcome: RunOutcome,
    pub report: Report,
}

pub struct Simulation {
    config: SimulationConfig,
    running: Arc<AtomicBool>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag shared with every scheduler this simulation builds.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Ask a run in progress to stop at its next tick boundary.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn build(&self, specs: &[TaskSpec], sink: impl TraceSink + Send + 'static) -> Result<Scheduler> {
        let scheduler = Scheduler::new(specs, self.config.scheduler.clone())
            .context("building scheduler")?
            .with_stop_flag(self.running.clone())
            .with_sink(sink);
        Ok(match self.config.tick_period {
            Some(period) => scheduler.with_pacer(WallClockPacer::new(period)),
            None => scheduler,
        })
    }

    /// Run to the end on the calling thread.
    pub fn run(&self, specs: &[TaskSpec], sink: impl TraceSink + Send + 'static) -> Result<SimulationResult> {
        let mut scheduler = self.build(specs, sink)?;
        Ok(finish(&mut scheduler))
    }

    /// Run on a dedicated `Scheduler` thread.
    ///
    /// Construction errors are returned here, before any thread exists. The scheduler, and with it
    /// the sink, is dropped when the thread finishes, so a channel consumer sees a disconnect.
    pub fn spawn(
        &self,
        specs: &[TaskSpec],
        sink: impl TraceSink + Send + 'static,
    ) -> Result<JoinHandle<SimulationResult>> {
        let mut scheduler = self.build(specs, sink)?;
        let paced = self.config.tick_period.is_some();
        let handle = std::thread::Builder::new()
            .name("Scheduler".to_string())
            .spawn(move || {
                if paced {
                    set_thread_priority(2);
                }
                finish(&mut scheduler)
            })
            .context("spawning scheduler thread")?;
        Ok(handle)
    }
}

fn finish(scheduler: &mut Scheduler) -> SimulationResult {
    let outcome = scheduler.run();
    SimulationResult {
        outcome,
        report: scheduler.report(),
    }
}

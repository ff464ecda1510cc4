// Simulator binary: load a task file, run it, print the trace and the statistics.
//
// The scheduler runs on its own thread and streams trace events over a channel to a printer thread,
// so a paced run (`--tick-ms`) shows events as they happen. Ctrl+C clears the running flag and the
// run stops at the next tick boundary with its statistics still printed.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tiered_sched::config::{DEFAULT_MAX_TASKS, DEFAULT_TIMEOUT_TICKS};
use tiered_sched::loader::load_tasks;
use tiered_sched::priority::{LOWEST_USER_LEVEL, MAX_LEVEL};
use tiered_sched::trace::{ChannelSink, NullSink, TraceEvent};
use tiered_sched::{
    DemotionPolicy, QueueOrdering, RunOutcome, SchedulerConfig, Simulation, SimulationConfig,
    TimeoutPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TimeoutArg {
    /// Measured from the last tick the task was active.
    LastActive,
    /// Measured from arrival.
    Arrival,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DemotionArg {
    Clamped,
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OrderingArg {
    /// Least recently active first.
    Activity,
    Fifo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    /// Trace as JSON lines, then the report as one JSON document.
    Json,
}

/// Four-tier task scheduler simulator (real-time FCFS + feedback queues).
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Task file, one `arrival, priority, burst` per line.
    input: PathBuf,

    /// Ticks a ready task may stay inactive before it is terminated.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_TICKS)]
    timeout: u64,

    #[arg(long, value_enum, default_value_t = TimeoutArg::LastActive)]
    timeout_policy: TimeoutArg,

    #[arg(long, value_enum, default_value_t = DemotionArg::Clamped)]
    demotion: DemotionArg,

    /// Lowest level a clamped demotion reaches.
    #[arg(long, default_value_t = LOWEST_USER_LEVEL)]
    floor: u32,

    #[arg(long, value_enum, default_value_t = OrderingArg::Activity)]
    ordering: OrderingArg,

    /// Idle ticks past the last arrival, in multiples of the timeout, before giving up.
    #[arg(long, default_value_t = 1)]
    stall_factor: u64,

    #[arg(long, default_value_t = DEFAULT_MAX_TASKS)]
    max_tasks: usize,

    /// Deepest queue level; input lines with a larger priority are skipped.
    #[arg(long, default_value_t = MAX_LEVEL)]
    max_level: u32,

    /// Milliseconds per tick; 0 runs on the virtual clock.
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print only the final report.
    #[arg(long, short)]
    quiet: bool,
}

impl Cli {
    fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            scheduler: SchedulerConfig {
                timeout_ticks: self.timeout,
                timeout_policy: match self.timeout_policy {
                    TimeoutArg::LastActive => TimeoutPolicy::SinceLastActive,
                    TimeoutArg::Arrival => TimeoutPolicy::SinceArrival,
                },
                demotion: match self.demotion {
                    DemotionArg::Clamped => DemotionPolicy::Clamped { floor: self.floor },
                    DemotionArg::Unbounded => DemotionPolicy::Unbounded,
                },
                ordering: match self.ordering {
                    OrderingArg::Activity => QueueOrdering::ActivityOrdered,
                    OrderingArg::Fifo => QueueOrdering::Fifo,
                },
                stall_factor: self.stall_factor,
                max_tasks: self.max_tasks,
                max_level: self.max_level,
            },
            tick_period: (self.tick_ms > 0).then(|| Duration::from_millis(self.tick_ms)),
        }
    }
}

fn print_event(out: &mut impl Write, event: &TraceEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{event}")?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(event)?)?,
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = cli.simulation_config();
    config.scheduler.validate().context("invalid scheduler options")?;
    let specs = load_tasks(&cli.input, config.scheduler.load_limits())?;
    if specs.is_empty() {
        eprintln!("no valid tasks in {}", cli.input.display());
        return Ok(ExitCode::FAILURE);
    }

    let simulation = Simulation::new(config);
    let running = simulation.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::Relaxed);
    })
    .context("installing signal handler")?;

    let format = cli.format;
    let (handle, printer) = if cli.quiet {
        (simulation.spawn(&specs, NullSink)?, None)
    } else {
        let (tx, rx) = crossbeam_channel::unbounded::<TraceEvent>();
        let handle = simulation.spawn(&specs, ChannelSink::new(tx))?;
        let printer = std::thread::Builder::new()
            .name("Trace-Printer".to_string())
            .spawn(move || -> Result<()> {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                for event in rx.iter() {
                    print_event(&mut out, &event, format)?;
                }
                out.flush()?;
                Ok(())
            })
            .context("spawning trace printer")?;
        (handle, Some(printer))
    };

    let result = handle
        .join()
        .map_err(|_| anyhow!("scheduler thread panicked"))?;
    if let Some(printer) = printer {
        printer
            .join()
            .map_err(|_| anyhow!("trace printer panicked"))??;
    }

    match format {
        OutputFormat::Text => println!("{}", result.report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.report)?),
    }
    match result.outcome {
        RunOutcome::Completed => {}
        RunOutcome::Stalled => eprintln!("run stalled: no task could make progress"),
        RunOutcome::Interrupted => eprintln!("run interrupted"),
    }
    Ok(ExitCode::SUCCESS)
}

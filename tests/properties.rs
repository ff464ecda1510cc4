use proptest::prelude::*;

use tiered_sched::config::{DemotionPolicy, QueueOrdering, SchedulerConfig, TimeoutPolicy};
use tiered_sched::trace::{EventKind, TraceEvent, TraceRecorder};
use tiered_sched::{RunOutcome, Scheduler, Step, TaskSpec, TaskState};

fn spec_strategy() -> impl Strategy<Value = TaskSpec> {
    (0u64..40, 0u32..5, 1u64..15).prop_map(|(a, p, b)| TaskSpec::new(a, p, b))
}

fn config_strategy() -> impl Strategy<Value = SchedulerConfig> {
    (
        prop_oneof![
            Just(TimeoutPolicy::SinceLastActive),
            Just(TimeoutPolicy::SinceArrival)
        ],
        prop_oneof![
            Just(DemotionPolicy::Clamped { floor: 3 }),
            Just(DemotionPolicy::Unbounded)
        ],
        prop_oneof![Just(QueueOrdering::ActivityOrdered), Just(QueueOrdering::Fifo)],
        5u64..30,
    )
        .prop_map(|(timeout_policy, demotion, ordering, timeout_ticks)| SchedulerConfig {
            timeout_ticks,
            timeout_policy,
            demotion,
            ordering,
            ..SchedulerConfig::default()
        })
}

/// Per-task snapshot used to compare consecutive steps.
#[derive(Debug, Clone, PartialEq)]
struct Seen {
    priority: u32,
    state: TaskState,
    remaining: u64,
    completion: Option<u64>,
}

fn snapshot(scheduler: &Scheduler) -> Vec<Seen> {
    scheduler
        .tasks()
        .iter()
        .map(|t| Seen {
            priority: t.current_priority,
            state: t.state,
            remaining: t.remaining_time,
            completion: t.completion_time,
        })
        .collect()
}

/// Between a real-time task's dispatch and its termination, no other task is dispatched or runs.
fn realtime_runs_are_contiguous(events: &[TraceEvent], realtime: &[bool]) -> bool {
    let mut holder: Option<usize> = None;
    for event in events {
        let dispatches = matches!(
            event.kind,
            EventKind::Started | EventKind::Continued | EventKind::Running
        );
        match holder {
            Some(id) if dispatches && event.task_id != id => return false,
            Some(id) if event.task_id == id && event.kind == EventKind::Terminated => {
                holder = None
            }
            None if dispatches && realtime[event.task_id] => holder = Some(event.task_id),
            _ => {}
        }
    }
    true
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn every_step_preserves_invariants(
        specs in prop::collection::vec(spec_strategy(), 1..40),
        config in config_strategy(),
    ) {
        let mut scheduler = Scheduler::new(&specs, config).unwrap();
        let mut previous = snapshot(&scheduler);
        let outcome = loop {
            let step = scheduler.step();
            prop_assert!(scheduler.verify_invariants().is_ok(), "{:?}", scheduler.verify_invariants());

            let current = snapshot(&scheduler);
            for (before, after) in previous.iter().zip(&current) {
                prop_assert!(after.priority >= before.priority, "promoted: {before:?} -> {after:?}");
                prop_assert!(after.remaining <= before.remaining);
                if before.state == TaskState::Terminated {
                    prop_assert_eq!(before, after);
                }
            }
            previous = current;

            if let Step::Finished(outcome) = step {
                break outcome;
            }
        };

        prop_assert_eq!(outcome, RunOutcome::Completed);
        let report = scheduler.report();
        prop_assert_eq!(report.completed + report.timed_out, specs.len());
        prop_assert!(report.cpu_utilization <= 1.0);
    }

    #[test]
    fn realtime_tasks_are_never_interleaved(
        specs in prop::collection::vec(spec_strategy(), 1..30),
        config in config_strategy(),
    ) {
        let recorder = TraceRecorder::new();
        let mut scheduler = Scheduler::new(&specs, config).unwrap().with_sink(recorder.clone());
        scheduler.run();

        let realtime: Vec<bool> = scheduler.tasks().iter().map(|t| t.is_realtime()).collect();
        prop_assert!(realtime_runs_are_contiguous(&recorder.events(), &realtime));
        for task in scheduler.tasks().iter().filter(|t| t.is_realtime() && t.start_time.is_some()) {
            prop_assert!(!task.timed_out);
            prop_assert_eq!(task.completion_time, task.start_time.map(|s| s + task.burst_time));
        }
    }

    #[test]
    fn repeated_sweep_is_a_no_op(
        specs in prop::collection::vec(spec_strategy(), 1..30),
        config in config_strategy(),
        steps in 0usize..60,
    ) {
        let recorder = TraceRecorder::new();
        let mut scheduler = Scheduler::new(&specs, config).unwrap().with_sink(recorder.clone());
        for _ in 0..steps {
            if let Step::Finished(_) = scheduler.step() {
                break;
            }
        }
        scheduler.sweep();
        let before = snapshot(&scheduler);
        let events = recorder.len();

        prop_assert_eq!(scheduler.admit_arrivals(), 0);
        prop_assert_eq!(scheduler.expire_timeouts(), 0);
        prop_assert_eq!(snapshot(&scheduler), before);
        prop_assert_eq!(recorder.len(), events);
    }

    #[test]
    fn work_is_conserved_and_bounded_by_burst(
        specs in prop::collection::vec(spec_strategy(), 1..40),
    ) {
        let mut scheduler = Scheduler::new(&specs, SchedulerConfig::default()).unwrap();
        scheduler.run();
        let executed: u64 = scheduler.tasks().iter().map(|t| t.executed_time).sum();
        prop_assert!(executed <= scheduler.now());
        for task in scheduler.tasks() {
            prop_assert_eq!(task.executed_time + task.remaining_time, task.burst_time);
            if task.completed_normally() {
                prop_assert_eq!(task.remaining_time, 0);
            }
        }
    }
}

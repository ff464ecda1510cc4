//! Best-effort thread priority for the paced scheduler thread.

/// Raise the calling thread's scheduling priority where the platform allows it.
///
/// `level` 0 leaves the thread on the default policy; higher values ask for more precedence.
///
/// - **Linux**: `pthread_setschedparam`, `SCHED_RR` for level 1 and `SCHED_FIFO` above.
/// - **macOS**: QoS classes via `pthread_set_qos_class_self_np`.
/// - **Other platforms**: no-op.
///
/// Real-time policies on Linux need `CAP_SYS_NICE`. Failure is logged and otherwise ignored:
/// the tick pacer only needs the elevation to keep ticks evenly spaced.
pub fn set_thread_priority(level: u8) {
    #[cfg(target_os = "linux")]
    {
        use libc::{pthread_self, pthread_setschedparam, sched_param, SCHED_FIFO, SCHED_OTHER, SCHED_RR};

        let (policy, sched_priority) = match level {
            0 => (SCHED_OTHER, 0),
            1 => (SCHED_RR, 30),
            _ => (SCHED_FIFO, 70),
        };
        // SAFETY: `sched_param` is plain data and `pthread_self` always names a live thread.
        let rc = unsafe {
            let mut param: sched_param = std::mem::zeroed();
            param.sched_priority = sched_priority;
            pthread_setschedparam(pthread_self(), policy, &param)
        };
        if rc != 0 {
            log::debug!("thread priority {level} not applied (errno {rc})");
        }
    }
    #[cfg(target_os = "macos")]
    {
        const QOS_CLASS_USER_INITIATED: u32 = 0x19;
        const QOS_CLASS_UTILITY: u32 = 0x11;
        const QOS_CLASS_DEFAULT: u32 = 0x15;

        extern "C" {
            fn pthread_set_qos_class_self_np(qos_class: u32, relative_priority: i32) -> i32;
        }

        let qos_class = match level {
            0 => QOS_CLASS_DEFAULT,
            1 => QOS_CLASS_UTILITY,
            _ => QOS_CLASS_USER_INITIATED,
        };
        // SAFETY: plain FFI call with constant arguments on the current thread.
        let rc = unsafe { pthread_set_qos_class_self_np(qos_class, 0) };
        if rc != 0 {
            log::debug!("thread priority {level} not applied (errno {rc})");
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = level;
    }
}

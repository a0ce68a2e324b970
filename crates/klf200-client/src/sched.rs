//! Listen-thread scheduling hints.
//!
//! Applied from the listen thread itself, best-effort: a rejected hint is
//! logged and the thread runs with default scheduling.

use tracing::warn;

use crate::config::{GatewayConfig, SchedPolicy};

#[cfg(unix)]
pub(crate) fn apply_listen_thread_priority(config: &GatewayConfig) {
    let Some(priority) = config.listen_thread_priority else {
        return;
    };
    let policy = match config.listen_thread_policy.unwrap_or(SchedPolicy::Other) {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::RoundRobin => libc::SCHED_RR,
        SchedPolicy::Other => libc::SCHED_OTHER,
    };
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: pthread_self() names the calling thread and `param` is a
    // valid pointer for the duration of the call.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy, &param) };
    if rc != 0 {
        warn!(priority, rc, "could not apply listen thread scheduling hints");
    }
}

#[cfg(not(unix))]
pub(crate) fn apply_listen_thread_priority(config: &GatewayConfig) {
    if config.listen_thread_priority.is_some() {
        warn!("listen thread scheduling hints are only supported on unix");
    }
}

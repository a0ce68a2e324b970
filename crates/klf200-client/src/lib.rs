//! Blocking TCP client for the KLF200 gateway control protocol.
//!
//! The client owns one persistent connection: a listen thread reads and
//! dispatches frames, an initialization thread logs in after every
//! (re)connect, and a heartbeat thread probes the gateway when the line
//! goes idle. Callers issue blocking operations — send-and-wait, or
//! send-and-collect notification streams — which share the connection
//! through the correlation engine. Packets that match no outstanding
//! operation are forwarded to an unsolicited-packet sink.

mod client;
mod config;
mod correlation;
mod error;
mod sched;
mod supervisor;

pub use client::{GatewayClient, LinkState, UnsolicitedSink, DEFAULT_WAIT_SECS};
pub use config::{GatewayConfig, SchedPolicy, DEFAULT_PORT};
pub use error::{ClientError, Result};
// Callers build requests and read responses in terms of the proto types.
pub use klf200_proto::{Command, Packet};

/// Lock a mutex, recovering the guard if a holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

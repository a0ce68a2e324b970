//! Request correlation: routing inbound packets to waiting callers.
//!
//! Both maps — one-shot pending requests and accumulating notification
//! collections — live behind a single mutex, held only for map mutation
//! and never across a blocking wait. Waiters block on per-request
//! condition variables with a one-second poll so a dropped connection is
//! observed promptly even without an explicit wakeup.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use klf200_proto::{Command, Packet};
use tracing::warn;

use crate::lock;

const POLL_TICK: Duration = Duration::from_secs(1);

/// One outstanding single-response wait.
pub(crate) struct PendingRequest {
    state: Mutex<PendingState>,
    ready: Condvar,
}

#[derive(Default)]
struct PendingState {
    response: Option<Arc<Packet>>,
    aborted: bool,
}

/// How a wait ended.
pub(crate) enum WaitOutcome {
    Completed(Arc<Packet>),
    TimedOut,
    Stopped,
}

impl PendingRequest {
    fn new() -> Self {
        Self {
            state: Mutex::new(PendingState::default()),
            ready: Condvar::new(),
        }
    }

    /// Deliver the matched response and wake the waiter.
    pub(crate) fn complete(&self, packet: Arc<Packet>) {
        let mut state = lock(&self.state);
        state.response = Some(packet);
        self.ready.notify_one();
    }

    /// Release the waiter without a response.
    pub(crate) fn abort(&self) {
        let mut state = lock(&self.state);
        state.aborted = true;
        self.ready.notify_all();
    }

    /// Block until the response arrives, the connection stops, or the
    /// timeout elapses.
    pub(crate) fn wait(&self, timeout: Duration, link_down: impl Fn() -> bool) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.state);
        loop {
            if let Some(packet) = state.response.clone() {
                return WaitOutcome::Completed(packet);
            }
            if state.aborted || link_down() {
                return WaitOutcome::Stopped;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            let tick = POLL_TICK.min(deadline - now);
            let (guard, _) = self
                .ready
                .wait_timeout(state, tick)
                .unwrap_or_else(|err| err.into_inner());
            state = guard;
        }
    }
}

/// The correlation maps, owned by the client and shared with the read loop.
#[derive(Default)]
pub(crate) struct ExchangeMap {
    inner: Mutex<Maps>,
}

#[derive(Default)]
struct Maps {
    pending: HashMap<Command, Arc<PendingRequest>>,
    collections: HashMap<Command, Vec<Arc<Packet>>>,
}

impl ExchangeMap {
    /// Register a one-shot waiter for `command`.
    ///
    /// Callers must not reuse a command while a prior registration for it
    /// is outstanding; a stale leftover is replaced (and its waiter
    /// released), which packet such overlapping callers see is undefined.
    pub(crate) fn register_pending(&self, command: Command) -> Arc<PendingRequest> {
        let request = Arc::new(PendingRequest::new());
        let stale = lock(&self.inner)
            .pending
            .insert(command, Arc::clone(&request));
        if let Some(stale) = stale {
            warn!(?command, "replacing a stale pending registration");
            stale.abort();
        }
        request
    }

    pub(crate) fn remove_pending(&self, command: Command) {
        lock(&self.inner).pending.remove(&command);
    }

    /// Start accumulating notifications carrying `command`.
    pub(crate) fn register_collection(&self, command: Command) {
        lock(&self.inner).collections.insert(command, Vec::new());
    }

    /// Remove and return the collection for `command`.
    pub(crate) fn take_collection(&self, command: Command) -> Vec<Arc<Packet>> {
        lock(&self.inner)
            .collections
            .remove(&command)
            .unwrap_or_default()
    }

    /// Inspect the payload of the most recently collected notification.
    pub(crate) fn last_collected<R>(
        &self,
        command: Command,
        inspect: impl FnOnce(&[u8]) -> R,
    ) -> Option<R> {
        let maps = lock(&self.inner);
        maps.collections
            .get(&command)
            .and_then(|collection| collection.last())
            .map(|packet| inspect(packet.payload()))
    }

    /// Route one inbound packet.
    ///
    /// A pending waiter gets the packet and is deregistered (at-most-once
    /// delivery), a collection appends it; otherwise the packet is handed
    /// back for the unsolicited sink.
    pub(crate) fn dispatch(&self, packet: Arc<Packet>) -> Option<Arc<Packet>> {
        let command = packet.command();
        let mut maps = lock(&self.inner);
        if let Some(request) = maps.pending.remove(&command) {
            drop(maps); // never wake a waiter while holding the map lock
            request.complete(packet);
            return None;
        }
        if let Some(collection) = maps.collections.get_mut(&command) {
            collection.push(packet);
            return None;
        }
        drop(maps);
        Some(packet)
    }

    /// Release every outstanding waiter without a response.
    pub(crate) fn abort_all(&self) {
        let requests: Vec<_> = lock(&self.inner).pending.values().cloned().collect();
        for request in requests {
            request.abort();
        }
    }

    /// Drop all registrations, releasing their waiters.
    pub(crate) fn clear(&self) {
        let stale: Vec<_> = {
            let mut maps = lock(&self.inner);
            maps.collections.clear();
            maps.pending.drain().map(|(_, request)| request).collect()
        };
        for request in stale {
            request.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn packet(command: Command) -> Arc<Packet> {
        Arc::new(Packet::new(command, Vec::new()).expect("empty payload always fits"))
    }

    #[test]
    fn dispatch_fulfils_a_waiter_exactly_once() {
        let map = ExchangeMap::default();
        let pending = map.register_pending(Command::GetStateCfm);

        assert!(map.dispatch(packet(Command::GetStateCfm)).is_none());
        match pending.wait(Duration::from_secs(1), || false) {
            WaitOutcome::Completed(response) => {
                assert_eq!(response.command(), Command::GetStateCfm)
            }
            _ => panic!("waiter must receive the matched packet"),
        }

        // The registration is gone; a second packet is unmatched.
        let unmatched = map.dispatch(packet(Command::GetStateCfm));
        assert!(unmatched.is_some());
    }

    #[test]
    fn waiter_ignores_other_commands() {
        let map = ExchangeMap::default();
        let pending = map.register_pending(Command::GetVersionCfm);

        assert!(map.dispatch(packet(Command::GetStateCfm)).is_some());
        match pending.wait(Duration::from_millis(50), || false) {
            WaitOutcome::TimedOut => {}
            _ => panic!("waiter must not be woken by other commands"),
        }
    }

    #[test]
    fn collections_accumulate_in_order() {
        let map = ExchangeMap::default();
        map.register_collection(Command::GetSceneListNtf);

        for i in 0..3u8 {
            let packet =
                Arc::new(Packet::new(Command::GetSceneListNtf, vec![i]).expect("payload fits"));
            assert!(map.dispatch(packet).is_none());
        }

        let collected = map.take_collection(Command::GetSceneListNtf);
        assert_eq!(collected.len(), 3);
        for (i, packet) in collected.iter().enumerate() {
            assert_eq!(packet.payload(), &[i as u8]);
        }
        // Taking removes the registration.
        assert!(map.dispatch(packet(Command::GetSceneListNtf)).is_some());
    }

    #[test]
    fn last_collected_sees_the_newest_payload() {
        let map = ExchangeMap::default();
        map.register_collection(Command::GetSceneListNtf);
        assert!(map
            .last_collected(Command::GetSceneListNtf, |payload| payload.to_vec())
            .is_none());

        for remaining in [2u8, 1, 0] {
            let packet = Arc::new(
                Packet::new(Command::GetSceneListNtf, vec![0, remaining]).expect("payload fits"),
            );
            map.dispatch(packet);
        }
        let last = map.last_collected(Command::GetSceneListNtf, |payload| payload.last().copied());
        assert_eq!(last, Some(Some(0)));
    }

    #[test]
    fn abort_releases_a_blocked_waiter() {
        let map = Arc::new(ExchangeMap::default());
        let pending = map.register_pending(Command::GetStateCfm);

        let aborter = {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                map.abort_all();
            })
        };

        let start = Instant::now();
        match pending.wait(Duration::from_secs(30), || false) {
            WaitOutcome::Stopped => {}
            _ => panic!("abort must release the waiter"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
        aborter.join().expect("aborter thread must not panic");
    }

    #[test]
    fn link_down_is_observed_within_a_tick() {
        let map = ExchangeMap::default();
        let pending = map.register_pending(Command::GetStateCfm);

        let start = Instant::now();
        match pending.wait(Duration::from_secs(30), || true) {
            WaitOutcome::Stopped => {}
            _ => panic!("link-down must stop the wait"),
        }
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn timeout_is_reported_after_the_bound() {
        let map = ExchangeMap::default();
        let pending = map.register_pending(Command::GetStateCfm);

        let start = Instant::now();
        match pending.wait(Duration::from_millis(200), || false) {
            WaitOutcome::TimedOut => {}
            _ => panic!("wait must time out"),
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn clear_drops_registrations_and_releases_waiters() {
        let map = ExchangeMap::default();
        let pending = map.register_pending(Command::GetStateCfm);
        map.register_collection(Command::GetSceneListNtf);

        map.clear();
        match pending.wait(Duration::from_secs(1), || false) {
            WaitOutcome::Stopped => {}
            _ => panic!("clear must release waiters"),
        }
        assert!(map.dispatch(packet(Command::GetStateCfm)).is_some());
        assert!(map.dispatch(packet(Command::GetSceneListNtf)).is_some());
    }
}

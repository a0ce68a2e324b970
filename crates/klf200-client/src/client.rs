//! The gateway client facade and its shared connection state.
//!
//! `GatewayClient` is the public surface; `Shared` is the state object
//! owned jointly by the facade and the supervisor threads. Outbound
//! requests are serialized by a dedicated send mutex so that
//! register-waiter → send → wait is atomic with respect to other senders:
//! a response can never arrive before its waiter is registered, and two
//! multi-phase exchanges can never interleave their registrations.

use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use klf200_frame::FrameWriter;
use klf200_proto::{Command, Packet};
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::correlation::{ExchangeMap, WaitOutcome};
use crate::error::{ClientError, Result};
use crate::{lock, supervisor};

/// Default bound for a single request/confirm exchange, in seconds.
pub const DEFAULT_WAIT_SECS: u64 = 15;

/// Fixed bound for the ack phase of a collection exchange, in seconds.
const ACK_WAIT_SECS: u64 = 15;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    /// No active physical connection, or logically halted.
    Stopped = 0,
    /// A connect attempt is in progress (or queued behind the quiescent
    /// reconnect delay).
    Connecting = 1,
    /// Physically connected, login/initialization not yet complete.
    Connected = 2,
    /// Logged in and initialized.
    Ready = 3,
}

impl LinkState {
    fn from_u8(value: u8) -> LinkState {
        match value {
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            3 => LinkState::Ready,
            _ => LinkState::Stopped,
        }
    }
}

/// Callback invoked for every inbound packet that matched no waiter or
/// collection, together with the interface id it arrived on.
pub type UnsolicitedSink = Box<dyn Fn(&str, Arc<Packet>) + Send + Sync>;

/// Blocking client for one KLF200 gateway connection.
pub struct GatewayClient {
    shared: Arc<Shared>,
    listen_thread: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct Shared {
    pub(crate) config: GatewayConfig,
    pub(crate) shutdown: AtomicBool,
    pub(crate) state: AtomicU8,
    pub(crate) connect_failures: AtomicU32,
    message_counter: AtomicU16,
    /// Extra handle onto the connected socket, used only for shutdown so
    /// a blocked writer can never hold shutdown hostage.
    pub(crate) socket: Mutex<Option<TcpStream>>,
    pub(crate) writer: Mutex<Option<FrameWriter<TcpStream>>>,
    send_serial: Mutex<()>,
    pub(crate) exchange: ExchangeMap,
    pub(crate) last_activity: Mutex<Instant>,
    pub(crate) init_thread: Mutex<Option<JoinHandle<()>>>,
    pub(crate) heartbeat_thread: Mutex<Option<JoinHandle<()>>>,
    pub(crate) sink: Option<UnsolicitedSink>,
}

impl GatewayClient {
    /// Create a client without an unsolicited-packet sink.
    pub fn new(config: GatewayConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a client delivering unmatched packets to `sink`.
    pub fn with_sink(
        config: GatewayConfig,
        sink: impl Fn(&str, Arc<Packet>) + Send + Sync + 'static,
    ) -> Self {
        Self::build(config, Some(Box::new(sink)))
    }

    fn build(config: GatewayConfig, sink: Option<UnsolicitedSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                shutdown: AtomicBool::new(false),
                state: AtomicU8::new(LinkState::Stopped as u8),
                connect_failures: AtomicU32::new(0),
                message_counter: AtomicU16::new(0),
                socket: Mutex::new(None),
                writer: Mutex::new(None),
                send_serial: Mutex::new(()),
                exchange: ExchangeMap::default(),
                last_activity: Mutex::new(Instant::now()),
                init_thread: Mutex::new(None),
                heartbeat_thread: Mutex::new(None),
                sink,
            }),
            listen_thread: Mutex::new(None),
        }
    }

    /// Open the connection: spawn the listen thread, which connects,
    /// logs in and initializes in the background.
    ///
    /// Re-entrant; an already running connection is stopped first.
    pub fn start(&self) -> Result<()> {
        self.stop();
        self.shared.config.validate()?;
        self.shared.shutdown.store(false, Ordering::SeqCst);
        self.shared.set_state(LinkState::Connecting);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("klf200-listen".to_string())
            .spawn(move || supervisor::listen(shared))?;
        *lock(&self.listen_thread) = Some(handle);
        Ok(())
    }

    /// Close the connection and join every owned thread.
    ///
    /// Safe to call from any state, including during a reconnect wait;
    /// outstanding waits resolve as [`ClientError::ConnectionStopped`].
    pub fn stop(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.set_state(LinkState::Stopped);
        self.shared.shutdown_socket();
        self.shared.exchange.abort_all();

        if let Some(handle) = lock(&self.listen_thread).take() {
            let _ = handle.join();
        }
        self.shared.join_worker(&self.shared.init_thread);
        self.shared.join_worker(&self.shared.heartbeat_thread);
        self.shared.drop_connection();
        // A connect attempt racing the shutdown flag may have stored a
        // fresher state; the joins above make this store the last word.
        self.shared.set_state(LinkState::Stopped);
    }

    /// True while a physical connection exists (initialized or not).
    pub fn is_open(&self) -> bool {
        matches!(
            self.shared.link_state(),
            LinkState::Connected | LinkState::Ready
        )
    }

    /// True once login and initialization have completed.
    pub fn is_ready(&self) -> bool {
        self.shared.link_state() == LinkState::Ready
    }

    /// Monotonically increasing message counter, wrapping at 16 bits.
    pub fn next_message_counter(&self) -> u16 {
        self.shared.message_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Fire-and-forget send of a pre-built packet.
    ///
    /// The expected confirm is inferred from the request→confirm table and
    /// awaited with the default bound; failures are logged, not returned.
    /// Commands with no mapped confirm are written without waiting.
    pub fn send(&self, packet: &Packet) {
        let confirm = packet.confirm_command();
        let result = if confirm == Command::Unset {
            let _serial = lock(&self.shared.send_serial);
            self.shared.write_packet(packet)
        } else {
            self.shared
                .get_response(confirm, packet, DEFAULT_WAIT_SECS)
                .map(|_| ())
        };
        if let Err(err) = result {
            error!(packet = %packet, %err, "error sending packet");
        }
    }

    /// Send a command and block for its confirm.
    pub fn send_and_await(
        &self,
        command: Command,
        payload: Vec<u8>,
        wait_secs: u64,
    ) -> Result<Arc<Packet>> {
        let confirm = command.confirm();
        if confirm == Command::Unset {
            return Err(ClientError::NoConfirmMapped(command));
        }
        let request = Packet::new(command, payload)?;
        self.shared.get_response(confirm, &request, wait_secs)
    }

    /// Enumerate all nodes paired to the gateway.
    pub fn enumerate_nodes(&self) -> Result<Vec<Arc<Packet>>> {
        self.shared.enumerate_nodes()
    }

    /// Enumerate all scenes stored on the gateway.
    pub fn enumerate_scenes(&self) -> Result<Vec<Arc<Packet>>> {
        self.shared.enumerate_scenes()
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    pub(crate) fn link_state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Promote `Connected` to `Ready`; a lost connection stays lost.
    pub(crate) fn promote_ready(&self) -> bool {
        self.state
            .compare_exchange(
                LinkState::Connected as u8,
                LinkState::Ready as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// True when no usable connection exists — observed by every wait.
    pub(crate) fn link_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
            || matches!(
                self.link_state(),
                LinkState::Stopped | LinkState::Connecting
            )
    }

    pub(crate) fn shutdown_socket(&self) {
        if let Some(socket) = lock(&self.socket).as_ref() {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }

    /// Shut down and forget the current socket and writer.
    pub(crate) fn drop_connection(&self) {
        self.shutdown_socket();
        lock(&self.socket).take();
        lock(&self.writer).take();
    }

    pub(crate) fn join_worker(&self, slot: &Mutex<Option<JoinHandle<()>>>) {
        if let Some(handle) = lock(slot).take() {
            let _ = handle.join();
        }
    }

    fn write_packet(&self, packet: &Packet) -> Result<()> {
        let mut writer = lock(&self.writer);
        let writer = writer.as_mut().ok_or(ClientError::NotConnected)?;
        debug!(packet = %packet, "sending packet");
        writer.send(packet.wire())?;
        Ok(())
    }

    /// Send `request` and block for the packet carrying `confirm`.
    pub(crate) fn get_response(
        &self,
        confirm: Command,
        request: &Packet,
        wait_secs: u64,
    ) -> Result<Arc<Packet>> {
        if self.link_down() {
            return Err(ClientError::NotConnected);
        }
        let _serial = lock(&self.send_serial);

        let pending = self.exchange.register_pending(confirm);
        if let Err(err) = self.write_packet(request) {
            self.exchange.remove_pending(confirm);
            return Err(err);
        }

        match pending.wait(Duration::from_secs(wait_secs), || self.link_down()) {
            WaitOutcome::Completed(packet) => Ok(packet),
            WaitOutcome::TimedOut => {
                self.exchange.remove_pending(confirm);
                error!(packet = %request, "no response received");
                Err(ClientError::NoResponse(confirm))
            }
            WaitOutcome::Stopped => {
                self.exchange.remove_pending(confirm);
                Err(ClientError::ConnectionStopped)
            }
        }
    }

    /// Send `request`, await its ack, then collect `notify` packets until
    /// the `finished` terminator arrives or `wait_secs` elapse.
    ///
    /// A missing terminator is a warning, not an error: whatever was
    /// collected is handed back with the ack.
    pub(crate) fn get_collected_responses(
        &self,
        confirm: Command,
        notify: Command,
        finished: Command,
        request: &Packet,
        wait_secs: u64,
    ) -> Result<(Arc<Packet>, Vec<Arc<Packet>>)> {
        if self.link_down() {
            return Err(ClientError::NotConnected);
        }
        let _serial = lock(&self.send_serial);

        let ack_pending = self.exchange.register_pending(confirm);
        let finished_pending = self.exchange.register_pending(finished);
        self.exchange.register_collection(notify);

        let cleanup = |shared: &Shared| {
            shared.exchange.remove_pending(confirm);
            shared.exchange.remove_pending(finished);
            shared.exchange.take_collection(notify);
        };

        if let Err(err) = self.write_packet(request) {
            cleanup(self);
            return Err(err);
        }

        let ack = match ack_pending.wait(Duration::from_secs(ACK_WAIT_SECS), || self.link_down()) {
            WaitOutcome::Completed(packet) => packet,
            WaitOutcome::TimedOut => {
                cleanup(self);
                error!(packet = %request, "no response received");
                return Err(ClientError::NoResponse(confirm));
            }
            WaitOutcome::Stopped => {
                cleanup(self);
                return Err(ClientError::ConnectionStopped);
            }
        };

        match finished_pending.wait(Duration::from_secs(wait_secs), || self.link_down()) {
            WaitOutcome::Completed(_) => {}
            WaitOutcome::TimedOut | WaitOutcome::Stopped => {
                warn!(packet = %request, "no \"finished\" notification received");
            }
        }

        self.exchange.remove_pending(finished);
        let collected = self.exchange.take_collection(notify);
        Ok((ack, collected))
    }

    /// Send `request`, await its ack, then collect `notify` packets until
    /// a remaining-items counter reaches zero or `wait_secs` elapse.
    ///
    /// The counter is the byte at `tail_offset` from the end of the most
    /// recently collected notification's payload (0 = last byte). Polled
    /// once per second.
    pub(crate) fn get_counted_responses(
        &self,
        confirm: Command,
        notify: Command,
        tail_offset: usize,
        request: &Packet,
        wait_secs: u64,
    ) -> Result<(Arc<Packet>, Vec<Arc<Packet>>)> {
        if self.link_down() {
            return Err(ClientError::NotConnected);
        }
        let _serial = lock(&self.send_serial);

        let ack_pending = self.exchange.register_pending(confirm);
        self.exchange.register_collection(notify);

        if let Err(err) = self.write_packet(request) {
            self.exchange.remove_pending(confirm);
            self.exchange.take_collection(notify);
            return Err(err);
        }

        let ack = match ack_pending.wait(Duration::from_secs(ACK_WAIT_SECS), || self.link_down()) {
            WaitOutcome::Completed(packet) => packet,
            WaitOutcome::TimedOut => {
                self.exchange.remove_pending(confirm);
                self.exchange.take_collection(notify);
                error!(packet = %request, "no response received");
                return Err(ClientError::NoResponse(confirm));
            }
            WaitOutcome::Stopped => {
                self.exchange.remove_pending(confirm);
                self.exchange.take_collection(notify);
                return Err(ClientError::ConnectionStopped);
            }
        };

        let mut remaining = 1u8;
        for _ in 0..wait_secs {
            std::thread::sleep(Duration::from_secs(1));
            if self.link_down() {
                break;
            }
            let counter = self
                .exchange
                .last_collected(notify, |payload| {
                    payload
                        .len()
                        .checked_sub(1 + tail_offset)
                        .map(|index| payload[index])
                })
                .flatten();
            if let Some(counter) = counter {
                remaining = counter;
                if remaining == 0 {
                    break;
                }
            }
        }
        if remaining != 0 {
            warn!(
                remaining,
                packet = %request,
                "not all notifications received before timeout"
            );
        }

        let collected = self.exchange.take_collection(notify);
        Ok((ack, collected))
    }

    pub(crate) fn enumerate_nodes(&self) -> Result<Vec<Arc<Packet>>> {
        let request = Packet::new(Command::GetAllNodesInformationReq, Vec::new())?;
        let (ack, nodes) = self
            .get_collected_responses(
                Command::GetAllNodesInformationCfm,
                Command::GetAllNodesInformationNtf,
                Command::GetAllNodesInformationFinishedNtf,
                &request,
                DEFAULT_WAIT_SECS,
            )
            .inspect_err(|err| {
                error!(%err, "could not enumerate nodes");
                self.set_state(LinkState::Stopped);
            })?;

        if ack.payload().len() < 2 {
            self.set_state(LinkState::Stopped);
            return Err(ClientError::Protocol(
                "short node enumeration ack".to_string(),
            ));
        }
        if ack.payload()[0] == 1 {
            info!("node table is empty");
        }
        let expected = ack.payload()[1] as usize;
        if nodes.len() != expected {
            warn!(
                expected,
                received = nodes.len(),
                "node enumeration is incomplete"
            );
        }
        Ok(nodes)
    }

    pub(crate) fn enumerate_scenes(&self) -> Result<Vec<Arc<Packet>>> {
        let request = Packet::new(Command::GetSceneListReq, Vec::new())?;
        // The scene list has no terminator; the remaining-scenes counter
        // is the last payload byte of each notification.
        let (ack, scenes) = self
            .get_counted_responses(
                Command::GetSceneListCfm,
                Command::GetSceneListNtf,
                0,
                &request,
                DEFAULT_WAIT_SECS,
            )
            .inspect_err(|err| {
                error!(%err, "could not enumerate scenes");
                self.set_state(LinkState::Stopped);
            })?;

        if ack.payload().len() < 2 {
            self.set_state(LinkState::Stopped);
            return Err(ClientError::Protocol(
                "short scene enumeration ack".to_string(),
            ));
        }
        debug!(scenes = ack.payload()[0], "scene list announced");
        Ok(scenes)
    }
}

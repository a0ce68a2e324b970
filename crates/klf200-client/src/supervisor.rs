//! The connection supervisor: listen thread, reconnect, heartbeat and the
//! per-connection initialization sequence.
//!
//! The listen thread is the only reader of the socket. Its read timeout
//! doubles as the heartbeat tick: a timed-out read is not an error, it is
//! the moment to check how long the line has been idle. Connection loss
//! is recovered by an unbounded retry loop with a fixed quiescent delay;
//! shutdown is the only exit.

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use klf200_frame::{FrameError, FrameReader, FrameWriter};
use klf200_proto::{Command, Packet};
use tracing::{debug, error, info, trace, warn};

use crate::client::{LinkState, Shared, DEFAULT_WAIT_SECS};
use crate::error::{ClientError, Result};
use crate::{lock, sched};

/// Socket read timeout; also the heartbeat tick.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Idle time after which a status-request heartbeat is issued.
const HEARTBEAT_IDLE: Duration = Duration::from_secs(15);

/// Wait bound for the heartbeat status request, in seconds.
const HEARTBEAT_WAIT_SECS: u64 = 60;

/// Quiescent delay before a reconnect attempt, in one-second ticks.
const RECONNECT_DELAY_TICKS: u32 = 15;

/// Wire width of the zero-padded password field.
const PASSWORD_FIELD_LEN: usize = 32;

/// Version-confirm bytes 7 and 8 identifying the KLF200 family.
const GATEWAY_FAMILY: [u8; 2] = [14, 3];

/// State-confirm value for "configured as gateway".
const GATEWAY_STATE_OPERATIONAL: u8 = 2;

/// Listen thread body: connect, read frames, dispatch, reconnect.
pub(crate) fn listen(shared: Arc<Shared>) {
    sched::apply_listen_thread_priority(&shared.config);

    let mut reader = connect_or_flag(&shared);

    while !shared.shutdown.load(Ordering::SeqCst) {
        if reader.is_none() || shared.link_down() {
            reader = None;
            shared.drop_connection();
            shared.exchange.abort_all();
            // Workers of the dying connection observe the stopped state
            // and exit within a poll tick; join them before the link
            // comes back so a stale failure cannot mark the next
            // connection stopped.
            shared.join_worker(&shared.init_thread);
            shared.join_worker(&shared.heartbeat_thread);
            if !quiesce(&shared) {
                break;
            }
            shared.set_state(LinkState::Connecting);
            reader = connect_or_flag(&shared);
            continue;
        }

        let Some(active) = reader.as_mut() else {
            continue;
        };
        match active.read_frame() {
            Ok(frame) => {
                *lock(&shared.last_activity) = Instant::now();
                shared.process_frame(&frame);
            }
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                shared.maybe_heartbeat();
            }
            Err(err) => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!(%err, "connection to gateway lost");
                shared.set_state(LinkState::Stopped);
                shared.exchange.abort_all();
                reader = None;
            }
        }
    }

    shared.drop_connection();
}

/// Interruptible reconnect delay; false when shutdown was requested.
fn quiesce(shared: &Shared) -> bool {
    warn!("connection to gateway closed, reconnecting shortly");
    for _ in 0..RECONNECT_DELAY_TICKS {
        if shared.shutdown.load(Ordering::SeqCst) {
            return false;
        }
        thread::sleep(Duration::from_secs(1));
    }
    !shared.shutdown.load(Ordering::SeqCst)
}

fn connect_or_flag(shared: &Arc<Shared>) -> Option<FrameReader<TcpStream>> {
    match connect(shared) {
        Ok(reader) => {
            shared.connect_failures.store(0, Ordering::SeqCst);
            spawn_init(shared);
            Some(reader)
        }
        Err(err) => {
            // Error once, then periodic warnings while retrying.
            let failures = shared.connect_failures.fetch_add(1, Ordering::SeqCst);
            if failures == 0 {
                error!(host = %shared.config.host, port = shared.config.port(), %err, "could not connect to gateway");
            } else {
                warn!(host = %shared.config.host, %err, "still cannot connect to gateway");
            }
            shared.set_state(LinkState::Stopped);
            None
        }
    }
}

fn connect(shared: &Shared) -> Result<FrameReader<TcpStream>> {
    let addrs = (shared.config.host.as_str(), shared.config.port()).to_socket_addrs()?;
    let timeout = shared.config.connect_timeout();

    let mut last_err = None;
    let mut stream = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(connected) => {
                stream = Some(connected);
                break;
            }
            Err(err) => last_err = Some(err),
        }
    }
    let stream = match stream {
        Some(stream) => stream,
        None => {
            return Err(last_err
                .map(ClientError::Io)
                .unwrap_or(ClientError::Config("host resolved to no addresses")));
        }
    };

    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    *lock(&shared.socket) = Some(stream.try_clone()?);
    *lock(&shared.writer) = Some(FrameWriter::new(stream.try_clone()?));
    *lock(&shared.last_activity) = Instant::now();
    shared.set_state(LinkState::Connected);
    info!(host = %shared.config.host, port = shared.config.port(), "connected to gateway");
    Ok(FrameReader::new(stream))
}

fn spawn_init(shared: &Arc<Shared>) {
    // Correlation state from a previous connection is meaningless now.
    shared.exchange.clear();
    shared.join_worker(&shared.init_thread);

    let worker = Arc::clone(shared);
    match thread::Builder::new()
        .name("klf200-init".to_string())
        .spawn(move || initialize(&worker))
    {
        Ok(handle) => *lock(&shared.init_thread) = Some(handle),
        Err(err) => {
            error!(%err, "could not spawn the initialization thread");
            shared.set_state(LinkState::Stopped);
        }
    }
}

fn initialize(shared: &Shared) {
    if let Err(err) = run_init_sequence(shared) {
        error!(%err, "gateway initialization failed");
        shared.set_state(LinkState::Stopped);
    }
}

fn run_init_sequence(shared: &Shared) -> Result<()> {
    // 1. Login. The password travels as a fixed-width zero-padded field.
    let mut secret = shared.config.password.clone().into_bytes();
    secret.resize(PASSWORD_FIELD_LEN, 0);
    let request = Packet::new(Command::PasswordEnterReq, secret)?;
    let response = shared
        .get_response(Command::PasswordEnterCfm, &request, DEFAULT_WAIT_SECS)
        .map_err(|_| {
            ClientError::Protocol("could not log in; check the configured password".to_string())
        })?;
    if response.payload().first().copied().unwrap_or(1) != 0 {
        return Err(ClientError::Protocol(
            "login rejected; check the configured password".to_string(),
        ));
    }

    // 2. Firmware version; bytes 7/8 identify the gateway family.
    let request = Packet::new(Command::GetVersionReq, Vec::new())?;
    let response = shared
        .get_response(Command::GetVersionCfm, &request, DEFAULT_WAIT_SECS)
        .map_err(|_| ClientError::Protocol("could not get version information".to_string()))?;
    let payload = response.payload().to_vec();
    if payload.len() < 9 {
        return Err(ClientError::Protocol("short version response".to_string()));
    }
    if payload[7] != GATEWAY_FAMILY[0] || payload[8] != GATEWAY_FAMILY[1] {
        return Err(ClientError::Protocol(
            "remote device is not a KLF200 gateway".to_string(),
        ));
    }
    let software = payload[..6]
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(".");
    info!(software = %software, hardware = payload[6], "gateway version verified");

    // 3. Protocol version, informational only.
    let request = Packet::new(Command::GetProtocolVersionReq, Vec::new())?;
    match shared.get_response(Command::GetProtocolVersionCfm, &request, DEFAULT_WAIT_SECS) {
        Ok(response) if response.payload().len() >= 4 => {
            let payload = response.payload();
            let major = u16::from_be_bytes([payload[0], payload[1]]);
            let minor = u16::from_be_bytes([payload[2], payload[3]]);
            info!(major, minor, "gateway protocol version");
        }
        Ok(_) | Err(_) => debug!("gateway protocol version unavailable"),
    }

    // 4. Enable the server-side status notification stream.
    let request = Packet::new(Command::HouseStatusMonitorEnableReq, Vec::new())?;
    shared
        .get_response(Command::HouseStatusMonitorEnableCfm, &request, DEFAULT_WAIT_SECS)
        .map_err(|_| ClientError::Protocol("could not enable the status monitor".to_string()))?;

    // 5. Push the current UTC time.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0);
    let request = Packet::new(Command::SetUtcReq, now.to_be_bytes().to_vec())?;
    shared
        .get_response(Command::SetUtcCfm, &request, DEFAULT_WAIT_SECS)
        .map_err(|_| ClientError::Protocol("could not push the current time".to_string()))?;

    // 6. Gateway state; a non-operational state is degraded but usable.
    let request = Packet::new(Command::GetStateReq, Vec::new())?;
    let response = shared
        .get_response(Command::GetStateCfm, &request, DEFAULT_WAIT_SECS)
        .map_err(|_| ClientError::Protocol("could not read the gateway state".to_string()))?;
    if response.payload().len() < 6 {
        return Err(ClientError::Protocol("short state response".to_string()));
    }
    let state = response.payload()[0];
    if state != GATEWAY_STATE_OPERATIONAL {
        warn!(
            state,
            "gateway is not configured as a gateway or has no nodes paired"
        );
    }

    *lock(&shared.last_activity) = Instant::now();
    if shared.promote_ready() {
        info!("gateway initialization complete");
    }
    Ok(())
}

impl Shared {
    /// Decode one frame and route the packet; malformed frames are logged
    /// and skipped, they never terminate the read loop.
    pub(crate) fn process_frame(self: &Arc<Self>, frame: &Bytes) {
        match Packet::from_wire(frame) {
            Ok(packet) => {
                trace!(packet = %packet, "received packet");
                let packet = Arc::new(packet);
                if let Some(unmatched) = self.exchange.dispatch(packet) {
                    match &self.sink {
                        Some(sink) => sink(&self.config.id, unmatched),
                        None => debug!(
                            command = ?unmatched.command(),
                            "unsolicited packet dropped (no sink installed)"
                        ),
                    }
                }
            }
            Err(err) => warn!(%err, len = frame.len(), "dropping malformed packet"),
        }
    }

    /// Spawn a heartbeat exchange if the line has been idle long enough.
    ///
    /// At most one heartbeat runs at a time; an unanswered status request
    /// marks the connection not-ready via the heartbeat thread itself.
    pub(crate) fn maybe_heartbeat(self: &Arc<Self>) {
        if !matches!(self.link_state(), LinkState::Connected | LinkState::Ready) {
            return;
        }
        if lock(&self.last_activity).elapsed() < HEARTBEAT_IDLE {
            return;
        }

        let mut slot = lock(&self.heartbeat_thread);
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        if let Some(handle) = slot.take() {
            let _ = handle.join();
        }

        *lock(&self.last_activity) = Instant::now();
        let worker = Arc::clone(self);
        match thread::Builder::new()
            .name("klf200-heartbeat".to_string())
            .spawn(move || heartbeat(&worker))
        {
            Ok(handle) => *slot = Some(handle),
            Err(err) => warn!(%err, "could not spawn the heartbeat thread"),
        }
    }
}

fn heartbeat(shared: &Shared) {
    let Ok(request) = Packet::new(Command::GetStateReq, Vec::new()) else {
        return;
    };
    if let Err(err) = shared.get_response(Command::GetStateCfm, &request, HEARTBEAT_WAIT_SECS) {
        error!(%err, "gateway stopped answering status requests");
        shared.set_state(LinkState::Stopped);
    }
}

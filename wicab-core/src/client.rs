//! The WiThrottle protocol client.
//!
//! [`WiThrottleClient`] orchestrates the transport and the decoder: it
//! performs the identification handshake, runs the background read
//! loop, answers the server-negotiated heartbeat, and republishes every
//! inbound line to subscribers in wire order.
//!
//! Lifecycle: `Disconnected → Connecting → Connected → Disconnected`.
//! Teardown is funneled through a single idempotent path, whether it is
//! triggered by an explicit `disconnect`, by the server closing the
//! stream, or by a read error.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commands::CabCommand;
use crate::error::CabError;
use crate::network::connection::{CabConnection, ConnectionInfo, LineSink, LineStream};
use crate::state::connection::ConnectionState;

/// Capacity of the raw-line broadcast channel. Slow subscribers lag
/// rather than stall the read loop.
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Device name announced in the `N` handshake line when none is given.
const DEFAULT_DEVICE_NAME: &str = "wicab";

// ── Shared state ─────────────────────────────────────────────────

/// Mutable client state shared with the background tasks.
///
/// The write half lives behind an async mutex (sends await the socket);
/// task handles and the negotiated interval live behind std mutexes and
/// are never held across an await.
struct Shared {
    /// Write half of the live connection; `None` while disconnected.
    writer: Mutex<Option<LineSink>>,
    /// Handle of the active heartbeat task, if any.
    heartbeat: StdMutex<Option<JoinHandle<()>>>,
    /// Last interval negotiated via `*<seconds>`; zero means disabled.
    heartbeat_interval: StdMutex<Duration>,
    /// Cancels the read loop of the current connection.
    cancel: StdMutex<Option<CancellationToken>>,
    /// Connection lifecycle, observable through `watch`.
    state_tx: watch::Sender<ConnectionState>,
    /// Raw inbound lines, republished in wire order.
    raw_tx: broadcast::Sender<String>,
}

// ── WiThrottleClient ─────────────────────────────────────────────

/// Asynchronous client for the WiThrottle line protocol.
pub struct WiThrottleClient {
    shared: Arc<Shared>,
    client_id: String,
    device_name: String,
    state_rx: watch::Receiver<ConnectionState>,
}

impl WiThrottleClient {
    /// Create a client with a random instance id and the default
    /// device name.
    pub fn new() -> Self {
        Self::with_options(Uuid::new_v4().to_string(), DEFAULT_DEVICE_NAME)
    }

    /// Create a client with a random instance id and an explicit
    /// device name.
    pub fn with_device_name(device_name: impl Into<String>) -> Self {
        Self::with_options(Uuid::new_v4().to_string(), device_name)
    }

    /// Create a client with an explicit instance id and device name.
    pub fn with_options(client_id: impl Into<String>, device_name: impl Into<String>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());
        let (raw_tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(None),
                heartbeat: StdMutex::new(None),
                heartbeat_interval: StdMutex::new(Duration::ZERO),
                cancel: StdMutex::new(None),
                state_tx,
                raw_tx,
            }),
            client_id: client_id.into(),
            device_name: device_name.into(),
            state_rx,
        }
    }

    /// The unique id sent in the `HU` handshake line.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The device name sent in the `N` handshake line.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect to `host:port` and perform the identification
    /// handshake: `HU<id>`, `N<name>`, `*+`, in that order, then start
    /// the background read loop.
    ///
    /// The handshake is fire-and-forget — no reply is awaited — but any
    /// send failure tears the connection back down and restores
    /// `Disconnected` before the error is returned. Connecting while
    /// not disconnected fails with [`CabError::InvalidState`].
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), CabError> {
        self.transition(ConnectionState::begin_connect)?;

        let info = ConnectionInfo::new(host.to_string(), port);
        let result = self.open_and_handshake(&info).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(%info, error = %e, "connect failed");
                teardown(&self.shared).await;
                Err(e)
            }
        }
    }

    async fn open_and_handshake(&self, info: &ConnectionInfo) -> Result<(), CabError> {
        let conn = CabConnection::connect(info).await?;
        info!(%info, "connected to WiThrottle server");
        self.transition(ConnectionState::complete_connect)?;

        let (mut sink, stream) = conn.into_split();
        for line in [
            CabCommand::Identify { id: self.client_id.clone() },
            CabCommand::SetName { name: self.device_name.clone() },
            CabCommand::HeartbeatMonitor,
        ] {
            let line = line.to_line();
            debug!(%line, "send");
            sink.send(line).await?;
        }

        let token = CancellationToken::new();
        *self.shared.cancel.lock().expect("cancel lock poisoned") = Some(token.clone());
        *self.shared.writer.lock().await = Some(sink);

        tokio::spawn(read_loop(Arc::clone(&self.shared), stream, token));
        Ok(())
    }

    /// Disconnect and release the connection. Idempotent: the read
    /// loop's own teardown and an explicit user action may both land
    /// here without double-closing anything. The client may `connect`
    /// again afterwards.
    pub async fn disconnect(&self) {
        teardown(&self.shared).await;
    }

    /// Hard shutdown at the end of the client's lifetime: disconnects
    /// and consumes the client, dropping all channels and handles.
    pub async fn close(self) {
        self.disconnect().await;
    }

    // ── Traffic ──────────────────────────────────────────────────

    /// Send one raw protocol line, verbatim.
    ///
    /// Fails with [`CabError::NotConnected`] when no connection is
    /// open — a command is never silently dropped.
    pub async fn send(&self, message: &str) -> Result<(), CabError> {
        let mut writer = self.shared.writer.lock().await;
        let sink = writer.as_mut().ok_or(CabError::NotConnected)?;
        debug!(%message, "send");
        sink.send(message.to_string()).await
    }

    /// Encode and send a typed command.
    pub async fn send_command(&self, command: &CabCommand) -> Result<(), CabError> {
        self.send(&command.to_line()).await
    }

    // ── Observation ──────────────────────────────────────────────

    /// Subscribe to the raw inbound line stream. Every non-empty line
    /// is delivered in the order it arrived on the wire.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.shared.raw_tx.subscribe()
    }

    /// Watch the connection lifecycle.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// The last heartbeat interval negotiated by the server; zero when
    /// disabled or not yet announced.
    pub fn heartbeat_interval(&self) -> Duration {
        *self
            .shared
            .heartbeat_interval
            .lock()
            .expect("heartbeat interval lock poisoned")
    }

    /// Run a validated state transition inside the watch channel, so
    /// observers and the check are updated atomically.
    fn transition(
        &self,
        f: impl FnOnce(&mut ConnectionState) -> Result<(), CabError>,
    ) -> Result<(), CabError> {
        let mut result = Ok(());
        self.shared.state_tx.send_if_modified(|state| match f(state) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }
}

impl Default for WiThrottleClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Read loop: frames lines off the socket, publishes them to
/// subscribers, and feeds the heartbeat handler. Terminal action is a
/// single teardown, whether the stream ended, errored, or the token
/// was cancelled from `disconnect`.
async fn read_loop(shared: Arc<Shared>, mut stream: LineStream, token: CancellationToken) {
    loop {
        let item = tokio::select! {
            _ = token.cancelled() => break,
            item = stream.next() => item,
        };
        match item {
            Some(Ok(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                debug!(%line, "recv");
                let _ = shared.raw_tx.send(line.to_string());
                handle_heartbeat(&shared, line);
            }
            Some(Err(e)) => {
                warn!(error = %e, "read error, dropping connection");
                break;
            }
            None => {
                info!("server closed the connection");
                break;
            }
        }
    }
    teardown(&shared).await;
}

/// React to `*<seconds>` interval announcements.
///
/// The server drops clients that stay silent longer than the announced
/// interval; pinging at half that keeps a safety margin. A new
/// announcement replaces the running task; `*0` disables keepalives.
/// Unparseable `*` lines leave the previous schedule untouched.
fn handle_heartbeat(shared: &Arc<Shared>, line: &str) {
    let Some(rest) = line.strip_prefix('*') else {
        return;
    };
    let Ok(seconds) = rest.parse::<u64>() else {
        debug!(%line, "not an interval announcement, ignoring");
        return;
    };
    let interval = Duration::from_secs(seconds);

    let mut slot = shared.heartbeat.lock().expect("heartbeat lock poisoned");
    if let Some(task) = slot.take() {
        task.abort();
    }
    *shared
        .heartbeat_interval
        .lock()
        .expect("heartbeat interval lock poisoned") = interval;

    if interval.is_zero() {
        debug!("heartbeat disabled by server");
        return;
    }

    let period = interval / 2;
    info!(?interval, ?period, "heartbeat scheduled");
    let shared = Arc::clone(shared);
    *slot = Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let mut writer = shared.writer.lock().await;
            let Some(sink) = writer.as_mut() else {
                break;
            };
            if let Err(e) = sink.send(CabCommand::HeartbeatPing.to_line()).await {
                warn!(error = %e, "keepalive failed");
                break;
            }
            debug!("keepalive sent");
        }
    }));
}

/// Tear down the active connection. Every resource is released at most
/// once, so the read loop's terminal call and explicit `disconnect`
/// calls can overlap freely.
async fn teardown(shared: &Shared) {
    if let Some(task) = shared
        .heartbeat
        .lock()
        .expect("heartbeat lock poisoned")
        .take()
    {
        task.abort();
    }
    *shared
        .heartbeat_interval
        .lock()
        .expect("heartbeat interval lock poisoned") = Duration::ZERO;

    if let Some(token) = shared.cancel.lock().expect("cancel lock poisoned").take() {
        token.cancel();
    }

    if let Some(mut sink) = shared.writer.lock().await.take() {
        if let Err(e) = sink.close().await {
            debug!(error = %e, "close after socket already went down");
        }
    }

    shared
        .state_tx
        .send_if_modified(|state| {
            let was = *state;
            state.force_disconnect();
            !was.is_disconnected()
        });
}

// ── Tests ────────────────────────────────────────────────────────

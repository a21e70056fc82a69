//! Session aggregate derived from the inbound event stream.
//!
//! [`Session`] folds decoded [`ServerMessage`]s into the connection's
//! entity model: track power, roster, and the throttles keyed by slot.
//! It is pure state — no I/O — so the same code drives both the live
//! [`SessionMonitor`] and the unit tests.
//!
//! Reads happen through [`SessionSnapshot`] clones, never through
//! shared mutable references, so a UI can render while the read loop
//! keeps mutating.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::WiThrottleClient;
use crate::error::CabError;
use crate::message::{RosterEntry, ServerMessage, ThrottleAction, TrackPower};
use crate::state::connection::ConnectionState;
use crate::throttle::Throttle;

// ── Session ──────────────────────────────────────────────────────

/// In-memory aggregate of everything the server has told us.
///
/// Slot ids are positional and never reused within a session: releasing
/// a slot leaves a hole rather than shifting later slots down.
#[derive(Debug, Default)]
pub struct Session {
    connection: ConnectionState,
    power: TrackPower,
    roster: Vec<RosterEntry>,
    throttles: Vec<Option<Throttle>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    pub fn power(&self) -> TrackPower {
        self.power
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    /// The throttle on a slot, if the slot exists and is not released.
    pub fn throttle(&self, slot: usize) -> Option<&Throttle> {
        self.throttles.get(slot).and_then(|s| s.as_ref())
    }

    // ── Caller-driven slot management ────────────────────────────

    /// Create a throttle for `address` on the next slot and return the
    /// slot id. Slots are only ever created here — never implicitly
    /// from an inbound update.
    pub fn acquire(&mut self, address: u16) -> Result<usize, CabError> {
        let throttle = Throttle::new(address)?;
        self.throttles.push(Some(throttle));
        Ok(self.throttles.len() - 1)
    }

    /// Release the throttle on `slot`. The slot id stays burned for
    /// the rest of the session.
    pub fn release(&mut self, slot: usize) -> Result<(), CabError> {
        match self.throttles.get_mut(slot) {
            Some(entry @ Some(_)) => {
                *entry = None;
                Ok(())
            }
            _ => Err(CabError::UnknownSlot(slot)),
        }
    }

    /// Discard all per-connection entities. Called on disconnect; the
    /// roster is kept so the UI can still show the last listing.
    pub fn reset(&mut self) {
        self.throttles.clear();
        self.power = TrackPower::Unknown;
    }

    // ── Event application ────────────────────────────────────────

    /// Fold one decoded message into the aggregate.
    ///
    /// Roster and power overwrite unconditionally; throttle updates
    /// apply only to slots that already exist. Heartbeats are the
    /// client's business and unrecognized lines change nothing.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::Roster(entries) => self.roster = entries.clone(),
            ServerMessage::Power(power) => self.power = *power,
            ServerMessage::ThrottleUpdate { slot, payload, .. } => {
                self.apply_throttle_update(*slot, payload);
            }
            ServerMessage::Heartbeat { .. } | ServerMessage::Unrecognized => {}
        }
    }

    fn apply_throttle_update(&mut self, slot: usize, payload: &str) {
        let Some(Some(throttle)) = self.throttles.get_mut(slot) else {
            debug!(slot, "update for unknown slot ignored");
            return;
        };
        match ThrottleAction::parse(payload) {
            Some(action) => throttle.apply(&action),
            None => debug!(slot, %payload, "unrecognized throttle payload"),
        }
    }

    /// Immutable copy of the current state, safe to hand to a UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.connection,
            power: self.power,
            roster: self.roster.clone(),
            throttles: self.throttles.clone(),
        }
    }
}

// ── SessionSnapshot ──────────────────────────────────────────────

/// A point-in-time copy of the [`Session`] state.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub power: TrackPower,
    pub roster: Vec<RosterEntry>,
    /// Slot table; `None` marks a released slot.
    pub throttles: Vec<Option<Throttle>>,
}

impl SessionSnapshot {
    /// The throttle on a slot, if present.
    pub fn throttle(&self, slot: usize) -> Option<&Throttle> {
        self.throttles.get(slot).and_then(|s| s.as_ref())
    }
}

// ── SessionMonitor ───────────────────────────────────────────────

/// Drives a [`Session`] from a client's event stream in the background
/// and publishes a [`SessionSnapshot`] on every change.
///
/// The monitor subscribes before returning, so no line published after
/// `spawn` is missed. Dropping the client ends the stream and the
/// background task with it.
pub struct SessionMonitor {
    session: Arc<StdMutex<Session>>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionMonitor {
    /// Subscribe to `client` and start the background fold.
    pub fn spawn(client: &WiThrottleClient) -> Self {
        let lines = client.subscribe();
        let state = client.connection_state();
        let session = Arc::new(StdMutex::new(Session::new()));
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let snapshot_tx = Arc::new(snapshot_tx);

        let task = tokio::spawn(run(
            lines,
            state,
            Arc::clone(&session),
            Arc::clone(&snapshot_tx),
        ));

        Self {
            session,
            snapshot_tx,
            snapshot_rx,
            task,
        }
    }

    /// Create a throttle slot for `address` and return its slot id.
    /// The caller still sends the matching acquire command itself.
    pub fn acquire(&self, address: u16) -> Result<usize, CabError> {
        let mut session = self.session.lock().expect("session lock poisoned");
        let slot = session.acquire(address)?;
        let _ = self.snapshot_tx.send(session.snapshot());
        Ok(slot)
    }

    /// Release a slot previously returned by [`acquire`](Self::acquire).
    pub fn release(&self, slot: usize) -> Result<(), CabError> {
        let mut session = self.session.lock().expect("session lock poisoned");
        session.release(slot)?;
        let _ = self.snapshot_tx.send(session.snapshot());
        Ok(())
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch snapshot changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Stop the background fold.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run(
    mut lines: broadcast::Receiver<String>,
    mut state: watch::Receiver<ConnectionState>,
    session: Arc<StdMutex<Session>>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
) {
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break; // client dropped
                }
                let connection = *state.borrow_and_update();
                let mut session = session.lock().expect("session lock poisoned");
                session.set_connection(connection);
                if connection.is_disconnected() {
                    session.reset();
                }
                let _ = snapshot_tx.send(session.snapshot());
            }
            line = lines.recv() => match line {
                Ok(line) => {
                    let message = ServerMessage::parse(&line);
                    let mut session = session.lock().expect("session lock poisoned");
                    session.apply(&message);
                    let _ = snapshot_tx.send(session.snapshot());
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "session monitor lagged behind the read loop");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MultiThrottleOp;
    use crate::throttle::Direction;

    fn update(slot: usize, payload: &str) -> ServerMessage {
        ServerMessage::ThrottleUpdate {
            slot,
            op: MultiThrottleOp::Action,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn power_and_roster_overwrite() {
        let mut session = Session::new();
        session.apply(&ServerMessage::parse("PPA1"));
        assert_eq!(session.power(), TrackPower::On);
        session.apply(&ServerMessage::parse("PPA0"));
        assert_eq!(session.power(), TrackPower::Off);

        session.apply(&ServerMessage::parse("RL2|Engine A|1234|L|Engine B|5678|S"));
        assert_eq!(session.roster().len(), 2);
        session.apply(&ServerMessage::parse("RL1|Engine C|42|S"));
        assert_eq!(session.roster().len(), 1);
        assert_eq!(session.roster()[0].name, "Engine C");
    }

    #[test]
    fn update_for_unknown_slot_is_noop_and_creates_nothing() {
        let mut session = Session::new();
        session.apply(&update(0, "V50"));
        assert!(session.throttle(0).is_none());
        assert!(session.snapshot().throttles.is_empty());
    }

    #[test]
    fn updates_route_to_acquired_slot() {
        let mut session = Session::new();
        let slot = session.acquire(1234).unwrap();
        assert_eq!(slot, 0);

        session.apply(&update(slot, "V26"));
        session.apply(&update(slot, "R0"));
        session.apply(&update(slot, "F07"));

        let throttle = session.throttle(slot).unwrap();
        assert_eq!(throttle.velocity(), 26);
        assert_eq!(throttle.direction(), Direction::Reverse);
        assert!(throttle.is_function_pressed(7));
    }

    #[test]
    fn velocity_clamped_on_application() {
        let mut session = Session::new();
        let slot = session.acquire(3).unwrap();
        session.apply(&update(slot, "V200"));
        assert_eq!(session.throttle(slot).unwrap().velocity(), 126);
    }

    #[test]
    fn unrecognized_payload_changes_nothing() {
        let mut session = Session::new();
        let slot = session.acquire(3).unwrap();
        session.apply(&update(slot, "V26"));
        session.apply(&update(slot, "L1234"));
        assert_eq!(session.throttle(slot).unwrap().velocity(), 26);
    }

    #[test]
    fn released_slot_ids_are_not_reused() {
        let mut session = Session::new();
        let first = session.acquire(3).unwrap();
        let second = session.acquire(1234).unwrap();
        session.release(first).unwrap();

        assert!(session.throttle(first).is_none());
        assert!(session.throttle(second).is_some());

        // Updates to the released slot stay no-ops.
        session.apply(&update(first, "V50"));
        assert!(session.throttle(first).is_none());

        // The next acquire burns a fresh id.
        let third = session.acquire(7).unwrap();
        assert_eq!(third, 2);
    }

    #[test]
    fn release_unknown_slot_fails() {
        let mut session = Session::new();
        let err = session.release(5).unwrap_err();
        assert!(matches!(err, CabError::UnknownSlot(5)));
    }

    #[test]
    fn acquire_validates_address() {
        let mut session = Session::new();
        assert!(matches!(
            session.acquire(10000),
            Err(CabError::InvalidAddress(10000))
        ));
        assert!(session.snapshot().throttles.is_empty());
    }

    #[test]
    fn reset_discards_throttles_and_power_keeps_roster() {
        let mut session = Session::new();
        session.apply(&ServerMessage::parse("RL1|Engine C|42|S"));
        session.apply(&ServerMessage::parse("PPA1"));
        session.acquire(3).unwrap();

        session.reset();
        assert!(session.snapshot().throttles.is_empty());
        assert_eq!(session.power(), TrackPower::Unknown);
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn connection_state_tracks_setter() {
        let mut session = Session::new();
        assert!(session.connection().is_disconnected());
        session.set_connection(ConnectionState::Connected);
        assert!(session.connection().is_connected());
        assert!(session.snapshot().connection.is_connected());
    }

    #[test]
    fn heartbeat_and_unrecognized_are_ignored() {
        let mut session = Session::new();
        session.apply(&ServerMessage::parse("*10"));
        session.apply(&ServerMessage::parse("HTJMRI"));
        assert_eq!(session.power(), TrackPower::Unknown);
        assert!(session.roster().is_empty());
    }

    #[tokio::test]
    async fn monitor_folds_client_stream() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;
        use tokio::time::{Duration, timeout};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = WiThrottleClient::new();
        let monitor = SessionMonitor::spawn(&client);
        let mut snapshots = monitor.watch();

        let accept = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            sock
        });
        client.connect("127.0.0.1", port).await.unwrap();
        let mut sock = accept.await.unwrap();

        sock.write_all(b"PPA1\n").await.unwrap();

        timeout(Duration::from_secs(2), async {
            loop {
                snapshots.changed().await.unwrap();
                if snapshots.borrow().power == TrackPower::On {
                    break;
                }
            }
        })
        .await
        .expect("power never reached On");

        let slot = monitor.acquire(1234).unwrap();
        sock.write_all(format!("M{slot}A<;>V33\n").as_bytes())
            .await
            .unwrap();

        timeout(Duration::from_secs(2), async {
            loop {
                snapshots.changed().await.unwrap();
                let velocity = snapshots
                    .borrow()
                    .throttle(slot)
                    .map(crate::throttle::Throttle::velocity);
                if velocity == Some(33) {
                    break;
                }
            }
        })
        .await
        .expect("velocity update never landed");

        // Disconnect discards the throttles in the next snapshot.
        client.disconnect().await;
        timeout(Duration::from_secs(2), async {
            loop {
                snapshots.changed().await.unwrap();
                let s = snapshots.borrow().clone();
                if s.connection.is_disconnected() && s.throttles.is_empty() {
                    break;
                }
            }
        })
        .await
        .expect("disconnect never reached the session");

        monitor.shutdown();
        client.close().await;
    }
}

//! Reconnect-forever supervision for a single link.
//!
//! A [`Connection`] owns one [`Link`] for the lifetime of the process and
//! drives it through the state machine
//!
//! ```text
//! Disconnected ── attempt ──► Connecting ── success ──► Connected
//!       ▲                                                   │
//!       └────────── retry after poll interval ◄── failure ──┘
//! ```
//!
//! The retry interval is fixed (no backoff, no jitter) and retries are
//! unbounded; there is no terminal state. Inbound payloads are delivered in
//! transport order on a broadcast channel, so consumers subscribe instead of
//! polling. Everything a session opened (sockets, listeners, reader tasks)
//! is owned by [`Link::run`] and dropped when it returns, so a stale session
//! can never deliver events into the next one.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use waybridge_types::{BridgeError, LinkConfig};

/// Buffered inbound payloads before old ones are dropped for slow
/// subscribers.
const RECEIVED_CAPACITY: usize = 256;

/// Connection lifecycle state, observable through [`Connection::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Handle a running [`Link`] session uses to report inbound data and the
/// moment the link comes up.
///
/// Cloneable so per-peer reader tasks (e.g. in the TCP server variant) can
/// forward payloads concurrently.
#[derive(Clone)]
pub struct LinkSink {
    received: broadcast::Sender<Vec<u8>>,
    state: watch::Sender<LinkState>,
}

impl LinkSink {
    pub(crate) fn new(
        received: broadcast::Sender<Vec<u8>>,
        state: watch::Sender<LinkState>,
    ) -> Self {
        Self { received, state }
    }

    /// Mark the link established. Call exactly once per successful session,
    /// after the underlying handle is actually usable.
    pub fn connected(&self) {
        let _ = self.state.send(LinkState::Connected);
    }

    /// Deliver one inbound chunk/message to all subscribers.
    ///
    /// A send error only means nobody is subscribed right now, which is a
    /// normal condition for raw links.
    pub fn received(&self, payload: Vec<u8>) {
        let _ = self.received.send(payload);
    }
}

/// The capability every transport variant supplies: establish the link and
/// pump it until it dies.
///
/// # Contract
///
/// * Establish the link (connect, bind, or open, depending on the variant).
/// * Call [`LinkSink::connected`] exactly once when the link is up.
/// * Forward every inbound chunk via [`LinkSink::received`], in transport
///   order.
/// * Return only when the session has failed, with the reason. All handles
///   and helper tasks the session created must die with the call frame.
#[async_trait]
pub trait Link: Send + 'static {
    /// Short protocol label used in log lines, e.g. `"tcp-client"`.
    fn kind(&self) -> &'static str;

    /// Run one session: connect, pump, fail.
    async fn run(&mut self, sink: &LinkSink) -> BridgeError;
}

/// Supervisor owning one [`Link`] and its retry loop.
///
/// Constructed once per configured link; dropping the `Connection` aborts
/// the supervisor task.
pub struct Connection {
    name: String,
    received: broadcast::Sender<Vec<u8>>,
    state: watch::Receiver<LinkState>,
    supervisor: JoinHandle<()>,
}

impl Connection {
    /// Spawn the supervisor for `link`. The first connect attempt starts
    /// immediately.
    pub fn spawn<L: Link>(config: &LinkConfig, link: L) -> Self {
        let (received_tx, _) = broadcast::channel(RECEIVED_CAPACITY);
        let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);

        let sink = LinkSink::new(received_tx.clone(), state_tx);
        let name = config.name.clone();
        let poll_interval = Duration::from_secs(config.poll_interval_secs);

        let supervisor = tokio::spawn(supervise(link, sink, name.clone(), poll_interval));

        Self {
            name,
            received: received_tx,
            state: state_rx,
            supervisor,
        }
    }

    /// Configured name of this link.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to inbound payloads. Delivery is FIFO per link; payloads
    /// published before the subscription are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.received.subscribe()
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Current snapshot of the connection state.
    pub fn is_connected(&self) -> bool {
        *self.state.borrow() == LinkState::Connected
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

async fn supervise<L: Link>(
    mut link: L,
    sink: LinkSink,
    name: String,
    poll_interval: Duration,
) {
    loop {
        let _ = sink.state.send(LinkState::Connecting);
        let err = link.run(&sink).await;
        let _ = sink.state.send(LinkState::Disconnected);

        warn!(link = %name, kind = link.kind(), error = %err, "connection error");
        info!(
            link = %name,
            kind = link.kind(),
            retry_in_secs = poll_interval.as_secs(),
            "reconnecting on fixed interval"
        );
        tokio::time::sleep(poll_interval).await;
    }
}

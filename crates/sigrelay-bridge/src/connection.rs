//! Connection manager: session lifecycle, bridge mode probe and the listen
//! loop.
//!
//! States: `Disconnected → Connecting → (Streaming | Polling) → Disconnected`.
//! `connect()` only allocates the HTTP client; `listen()` probes
//! `/v1/about` once and then either reads the WebSocket receive stream
//! (`json-rpc` mode) or polls the receive endpoint forever.
//!
//! The session is shared-read: every request takes a [`SessionHandle`]
//! under the read lock, while `disconnect()` takes the write lock and
//! signals the session's shutdown watch so in-flight work is abandoned.

use crate::decoder::PacketDecoder;
use crate::endpoints::BridgeEndpoints;
use crate::error::{BridgeError, BridgeResult};
use crate::router::EventRouter;
use futures::StreamExt;
use sigrelay_types::event::NormalizedEvent;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info};

/// Mode value reported by `/v1/about` when the bridge streams over WebSocket.
const STREAMING_MODE: &str = "json-rpc";

/// How packets are received, decided once per `listen()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// One persistent WebSocket on the receive endpoint.
    Streaming,
    /// Periodic GETs on the receive endpoint.
    Polling,
}

impl BridgeMode {
    /// Pick the mode from a `/v1/about` response body.
    pub fn from_about(about: &serde_json::Value) -> Self {
        if about.get("mode").and_then(|m| m.as_str()) == Some(STREAMING_MODE) {
            BridgeMode::Streaming
        } else {
            BridgeMode::Polling
        }
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session.
    Disconnected,
    /// Session allocated, receive mode not decided yet.
    Connecting,
    Streaming,
    Polling,
}

impl From<BridgeMode> for ConnectionState {
    fn from(mode: BridgeMode) -> Self {
        match mode {
            BridgeMode::Streaming => ConnectionState::Streaming,
            BridgeMode::Polling => ConnectionState::Polling,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Streaming => write!(f, "streaming"),
            ConnectionState::Polling => write!(f, "polling"),
        }
    }
}

struct Session {
    client: reqwest::Client,
    shutdown_tx: watch::Sender<bool>,
}

/// A cheap view of the live session for one exchange.
#[derive(Clone)]
pub struct SessionHandle {
    client: reqwest::Client,
    shutdown_rx: watch::Receiver<bool>,
}

impl SessionHandle {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Whether the session has been torn down.
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Resolves once the session has been torn down.
    pub async fn cancelled(&self) {
        let mut rx = self.shutdown_rx.clone();
        if *rx.borrow_and_update() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Run `fut`, abandoning it with `Disconnected` if the session goes away.
    pub async fn run<F, T>(&self, fut: F) -> BridgeResult<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        tokio::select! {
            result = fut => result,
            _ = self.cancelled() => Err(BridgeError::Disconnected),
        }
    }
}

/// Turn a bridge response into its body, failing on non-success status.
///
/// Empty bodies become `null` and non-JSON bodies are returned as a JSON
/// string, since several endpoints answer with nothing at all.
pub(crate) async fn response_body(resp: reqwest::Response) -> BridgeResult<serde_json::Value> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(BridgeError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
}

/// Owns the session and runs the inbound loop.
pub struct ConnectionManager {
    endpoints: BridgeEndpoints,
    decoder: PacketDecoder,
    poll_interval: Duration,
    session: RwLock<Option<Session>>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(endpoints: BridgeEndpoints, decoder: PacketDecoder, poll_interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            endpoints,
            decoder,
            poll_interval,
            session: RwLock::new(None),
            state_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    pub fn endpoints(&self) -> &BridgeEndpoints {
        &self.endpoints
    }

    /// Allocate the session. A live session is kept as is.
    pub async fn connect(&self) -> BridgeResult<()> {
        let mut guard = self.session.write().await;
        if guard.is_some() {
            debug!("Session already open");
            return Ok(());
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("sigrelay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (shutdown_tx, _) = watch::channel(false);
        *guard = Some(Session {
            client,
            shutdown_tx,
        });
        self.set_state(ConnectionState::Connecting);
        info!("Session opened");
        Ok(())
    }

    /// Release the session. In-flight requests and `listen()` are abandoned.
    pub async fn disconnect(&self) {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            let _ = session.shutdown_tx.send(true);
            info!("Session closed");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Handle on the live session, waiting out any lifecycle transition.
    pub async fn session(&self) -> BridgeResult<SessionHandle> {
        let guard = self.session.read().await;
        guard
            .as_ref()
            .map(|s| SessionHandle {
                client: s.client.clone(),
                shutdown_rx: s.shutdown_tx.subscribe(),
            })
            .ok_or(BridgeError::NotConnected)
    }

    /// Query `/v1/about` and pick the receive mode.
    pub async fn probe(&self, handle: &SessionHandle) -> BridgeResult<BridgeMode> {
        let url = self.endpoints.about();
        let about = handle
            .run(async {
                let resp = handle.client().get(url).send().await?;
                response_body(resp).await
            })
            .await?;
        debug!(about = %about, "About signal-cli-rest-api");
        Ok(BridgeMode::from_about(&about))
    }

    /// Receive packets and forward decoded events to `router`.
    ///
    /// Returns `Ok(())` when the stream closes, the router goes away or the
    /// session is torn down. Transport failures are returned to the caller;
    /// restarting is the host's business.
    pub async fn listen(&self, router: &dyn EventRouter) -> BridgeResult<()> {
        let handle = self.session().await?;
        let result = async {
            let mode = self.probe(&handle).await?;
            self.enter_mode(&handle, mode).await?;
            match mode {
                BridgeMode::Streaming => self.stream(&handle, router).await,
                BridgeMode::Polling => self.poll(&handle, router).await,
            }
        }
        .await;

        {
            let guard = self.session.read().await;
            if guard.is_some() && !handle.is_cancelled() {
                self.set_state(ConnectionState::Connecting);
            }
        }

        match result {
            Err(BridgeError::Disconnected) => {
                info!("Listen loop stopped by disconnect");
                Ok(())
            }
            other => other,
        }
    }

    /// Publish the receive mode, unless the session was torn down meanwhile.
    async fn enter_mode(&self, handle: &SessionHandle, mode: BridgeMode) -> BridgeResult<()> {
        let guard = self.session.read().await;
        if guard.is_none() || handle.is_cancelled() {
            return Err(BridgeError::Disconnected);
        }
        self.set_state(mode.into());
        Ok(())
    }

    /// Forward events in order. `false` means the router is closed.
    async fn forward(&self, router: &dyn EventRouter, events: Vec<NormalizedEvent>) -> bool {
        for event in events {
            if router.submit(event).await.is_err() {
                info!("Router closed, stopping listen loop");
                return false;
            }
        }
        true
    }

    async fn stream(&self, handle: &SessionHandle, router: &dyn EventRouter) -> BridgeResult<()> {
        let url = self.endpoints.receive_stream();
        info!(url = %url, "Opening receive stream");
        let (mut ws, _) = handle
            .run(async {
                tokio_tungstenite::connect_async(url.as_str())
                    .await
                    .map_err(BridgeError::from)
            })
            .await?;

        loop {
            let frame = tokio::select! {
                frame = ws.next() => frame,
                _ = handle.cancelled() => {
                    let _ = ws.close(None).await;
                    return Err(BridgeError::Disconnected);
                }
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    let events = self.decoder.decode_text(&text);
                    if !self.forward(router, events).await {
                        let _ = ws.close(None).await;
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Receive stream closed");
                    return Ok(());
                }
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) => {
                    info!("Receive stream closed");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn poll(&self, handle: &SessionHandle, router: &dyn EventRouter) -> BridgeResult<()> {
        let url = self.endpoints.receive();
        info!(url = %url, interval = ?self.poll_interval, "Polling bridge for packets");

        loop {
            let body = handle
                .run(async {
                    let resp = handle.client().get(url.clone()).send().await?;
                    response_body(resp).await
                })
                .await?;

            let packets = match body {
                serde_json::Value::Array(packets) => packets,
                serde_json::Value::Null => Vec::new(),
                other => {
                    return Err(BridgeError::Protocol(format!(
                        "receive endpoint returned {other} instead of a packet array"
                    )))
                }
            };

            for packet in packets {
                let events = self.decoder.decode(packet);
                if !self.forward(router, events).await {
                    return Ok(());
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = handle.cancelled() => return Err(BridgeError::Disconnected),
            }
        }
    }
}

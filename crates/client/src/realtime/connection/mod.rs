//! Hub connections: shared handle/backend types plus the platform-specific
//! transport loop.
//!
//! A connection is split in two halves. The [`HubHandle`] lives on the UI
//! side: it sends invocations, reports status and hands out subscriptions.
//! The [`HubBackend`] is owned by the transport task, which feeds lifecycle
//! signals and decoded invocations to every subscription in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use courtside_shared::HubInvocation;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use rand::Rng;
use serde_json::Value;

use super::status::ConnectionStatus;

/// Key of a connection: base URL without trailing slashes, then the hub name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HubKey(String);

impl HubKey {
    pub fn new(base_url: &str, hub: &str) -> Self {
        Self(format!("{}:{}", base_url.trim_end_matches('/'), hub))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HubKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("hub {0} is not connected")]
    NotConnected(String),
    #[error("hub {0} has been stopped")]
    Stopped(String),
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),
}

/// What a caller needs to open a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub hub: String,
    pub token: Option<String>,
}

impl ConnectionConfig {
    pub fn new(base_url: impl Into<String>, hub: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            hub: hub.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn key(&self) -> HubKey {
        HubKey::new(&self.base_url, &self.hub)
    }

    /// WebSocket URL of the hub: `<base>/hubs/<hub>` with the scheme
    /// switched to `ws`/`wss` and the token as `access_token`.
    pub fn hub_url(&self) -> Result<String, TransportError> {
        let raw = format!("{}/hubs/{}", self.base_url.trim_end_matches('/'), self.hub);
        let mut url =
            url::Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, raw
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::InvalidUrl(raw.clone()))?;

        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        Ok(url.to_string())
    }
}

/// Automatic reconnect behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum reconnect attempts after a drop before giving up (0 = never give up)
    pub max_attempts: u32,
    /// Base delay, doubled per attempt
    pub base_delay_ms: u64,
    /// Cap on the backoff delay before jitter
    pub max_delay_ms: u64,
    /// Extra random delay as a fraction of the backoff delay
    pub jitter_ratio: f64,
    /// Wait before starting over after the connection closed for good
    pub restart_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_ratio: 0.1,
            restart_delay_ms: 5_000,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff for the 1-based reconnect `attempt`, without jitter.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms)
    }

    /// Backoff plus random jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let backoff = self.backoff_ms(attempt);
        let max_jitter = (backoff as f64 * self.jitter_ratio).max(0.0);
        let jitter = if max_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..max_jitter)
        } else {
            0.0
        };
        backoff + jitter as u64
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt > self.max_attempts
    }
}

/// Connection lifecycle as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
    Reconnected,
    /// The connection is down. `error` is `None` for a requested stop.
    Closed { error: Option<String> },
}

impl Lifecycle {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Lifecycle::Connecting => ConnectionStatus::Connecting,
            Lifecycle::Open | Lifecycle::Reconnected => ConnectionStatus::Connected,
            Lifecycle::Reconnecting { .. } => ConnectionStatus::Reconnecting,
            Lifecycle::Closed { .. } => ConnectionStatus::Disconnected,
        }
    }
}

/// Everything a subscription can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    Lifecycle(Lifecycle),
    Invocation(HubInvocation),
}

/// Messages from the handle to the transport task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Invoke(HubInvocation),
    Stop,
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    senders: Vec<(u64, UnboundedSender<TransportSignal>)>,
}

/// Fan-out of transport signals to every attached subscription.
#[derive(Clone, Default)]
struct Listeners(Arc<Mutex<ListenerTable>>);

impl Listeners {
    fn lock(&self) -> std::sync::MutexGuard<'_, ListenerTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self) -> (u64, UnboundedReceiver<TransportSignal>) {
        let (tx, rx) = unbounded();
        let mut table = self.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.senders.push((id, tx));
        (id, rx)
    }

    fn remove(&self, id: u64) {
        self.lock().senders.retain(|(listener, _)| *listener != id);
    }

    fn broadcast(&self, signal: &TransportSignal) {
        self.lock()
            .senders
            .retain(|(_, tx)| tx.unbounded_send(signal.clone()).is_ok());
    }

    fn len(&self) -> usize {
        self.lock().senders.len()
    }
}

/// State shared by both halves of a connection.
#[derive(Clone)]
struct Shared {
    key: HubKey,
    connection_id: uuid::Uuid,
    listeners: Listeners,
    status: Arc<Mutex<ConnectionStatus>>,
    stopped: Arc<AtomicBool>,
}

/// UI-side half of a connection. Cheap to clone.
#[derive(Clone)]
pub struct HubHandle {
    shared: Shared,
    outbound: UnboundedSender<Outbound>,
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("key", &self.shared.key)
            .field("connection_id", &self.shared.connection_id)
            .field("status", &self.status())
            .finish()
    }
}

impl HubHandle {
    pub fn key(&self) -> &HubKey {
        &self.shared.key
    }

    /// Identifies this connection instance; a stopped and restarted key gets
    /// a new ID.
    pub fn connection_id(&self) -> uuid::Uuid {
        self.shared.connection_id
    }

    pub fn status(&self) -> ConnectionStatus {
        *self
            .shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// True once `stop` was called; the connection will not come back.
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Fire-and-forget call of a server method.
    pub fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<(), TransportError> {
        if self.is_stopped() {
            return Err(TransportError::Stopped(self.shared.key.to_string()));
        }
        if !self.is_connected() {
            return Err(TransportError::NotConnected(self.shared.key.to_string()));
        }
        crate::log_debug!("[{}] invoke {}", self.shared.key, method);
        self.outbound
            .unbounded_send(Outbound::Invoke(HubInvocation::new(method, arguments)))
            .map_err(|_| TransportError::Stopped(self.shared.key.to_string()))
    }

    /// Attach a new listener. Dropping the subscription detaches it.
    pub fn subscribe(&self) -> HubSubscription {
        let (id, receiver) = self.shared.listeners.add();
        HubSubscription {
            id,
            listeners: self.shared.listeners.clone(),
            receiver,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Close the connection for good.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        crate::log_info!("[{}] stopping connection", self.shared.key);
        let _ = self.outbound.unbounded_send(Outbound::Stop);
    }
}

/// A listener attached to one connection.
pub struct HubSubscription {
    id: u64,
    listeners: Listeners,
    receiver: UnboundedReceiver<TransportSignal>,
}

impl HubSubscription {
    /// Next signal, or `None` once the transport is gone.
    pub async fn next(&mut self) -> Option<TransportSignal> {
        self.receiver.next().await
    }

    /// Next already-delivered signal without waiting.
    pub fn try_next(&mut self) -> Option<TransportSignal> {
        self.receiver.try_next().ok().flatten()
    }
}

impl Drop for HubSubscription {
    fn drop(&mut self) {
        self.listeners.remove(self.id);
    }
}

/// Transport-side emitter. Updates the shared status before fanning a
/// signal out, so `HubHandle::status` is current by the time listeners run.
#[derive(Clone)]
pub struct HubEmitter {
    shared: Shared,
}

impl HubEmitter {
    pub fn key(&self) -> &HubKey {
        &self.shared.key
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn lifecycle(&self, lifecycle: Lifecycle) {
        *self
            .shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = lifecycle.status();
        self.shared
            .listeners
            .broadcast(&TransportSignal::Lifecycle(lifecycle));
    }

    /// The transport gave up for good: the handle reports stopped and the
    /// manager opens a fresh connection on the next `start`.
    pub fn finish(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
    }

    pub fn dispatch(&self, invocation: HubInvocation) {
        self.shared
            .listeners
            .broadcast(&TransportSignal::Invocation(invocation));
    }
}

/// Transport-side half of a connection.
pub struct HubBackend {
    pub emitter: HubEmitter,
    pub outbound: UnboundedReceiver<Outbound>,
}

/// Create both halves of a connection for `key`.
pub fn hub_channel(key: HubKey) -> (HubHandle, HubBackend) {
    let shared = Shared {
        key,
        connection_id: uuid::Uuid::new_v4(),
        listeners: Listeners::default(),
        status: Arc::new(Mutex::new(ConnectionStatus::Disconnected)),
        stopped: Arc::new(AtomicBool::new(false)),
    };
    let (tx, rx) = unbounded();
    (
        HubHandle {
            shared: shared.clone(),
            outbound: tx,
        },
        HubBackend {
            emitter: HubEmitter { shared },
            outbound: rx,
        },
    )
}

/// Opens transports for the connection manager.
pub trait Connector {
    fn connect(&self, config: &ConnectionConfig) -> HubHandle;
}

/// The real transport: a WebSocket per hub with automatic reconnect.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    pub policy: ReconnectPolicy,
}

impl WebSocketConnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy }
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, config: &ConnectionConfig) -> HubHandle {
        let (handle, backend) = hub_channel(config.key());
        spawn_hub(config.clone(), self.policy.clone(), backend);
        handle
    }
}

// Include platform-specific implementation
#[cfg(target_arch = "wasm32")]
mod connection_wasm;
#[cfg(target_arch = "wasm32")]
use connection_wasm::spawn_hub;

#[cfg(not(target_arch = "wasm32"))]
mod connection_native;
#[cfg(not(target_arch = "wasm32"))]
use connection_native::spawn_hub;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use for4_core::{ClientSettings, UserId};
use for4_crypto::{CryptoError, EnvelopeCodec};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::{
    listeners::{ListenerRegistry, Subscription, SubscriptionKind},
    OutgoingEvent, Transport, TransportLink,
};

/// Announces which user room the connection belongs to. Sent on every connect.
pub const JOIN_USER_ROOM: &str = "join_user_room";

/// Lifecycle of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    #[allow(missing_docs)]
    Connected,
    /// Waiting for or running reconnection attempt `attempt`, counted from 1.
    Reconnecting {
        #[allow(missing_docs)]
        attempt: u32,
    },
}

/// Policy for a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Reconnection attempts after a failed connect or a lost connection before going offline.
    pub reconnection_attempts: u32,
    /// Fixed delay between attempts.
    pub reconnection_delay: Duration,
    /// Default deadline for [`ConnectionManager::call`].
    pub request_timeout: Duration,
    /// User room to join on every connect.
    pub room: Option<UserId>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(10),
            room: None,
        }
    }
}

impl ConnectionOptions {
    #[allow(missing_docs)]
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            reconnection_attempts: settings.reconnection_attempts,
            reconnection_delay: settings.reconnection_delay(),
            request_timeout: settings.request_timeout(),
            room: None,
        }
    }

    #[allow(missing_docs)]
    pub fn with_room(mut self, room: UserId) -> Self {
        self.room = Some(room);
        self
    }
}

/// The single realtime connection of a session.
///
/// Cloning is cheap and every clone drives the same connection. The connection is closed when
/// [`ConnectionManager::shutdown`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Handle>,
}

struct Handle {
    shared: Arc<Shared>,
    _shutdown: DropGuard,
}

pub(crate) struct Shared {
    pub(crate) codec: EnvelopeCodec,
    pub(crate) request_timeout: Duration,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) shutdown: CancellationToken,
    link: Mutex<Option<mpsc::UnboundedSender<OutgoingEvent>>>,
    state: watch::Sender<ConnectionState>,
    offline: watch::Sender<bool>,
}

impl ConnectionManager {
    /// Start connecting in the background. Must be called from within a tokio runtime.
    pub fn start<T: Transport>(
        transport: T,
        codec: EnvelopeCodec,
        options: ConnectionOptions,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let shared = Arc::new(Shared {
            codec,
            request_timeout: options.request_timeout,
            listeners: Arc::new(ListenerRegistry::default()),
            shutdown: shutdown.clone(),
            link: Mutex::new(None),
            state: watch::channel(ConnectionState::Connecting).0,
            offline: watch::channel(false).0,
        });

        tokio::spawn(run(shared.clone(), transport, options));

        Self {
            inner: Arc::new(Handle {
                shared,
                _shutdown: shutdown.drop_guard(),
            }),
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    /// Whether the connection is currently up.
    pub fn connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    #[allow(missing_docs)]
    pub fn state(&self) -> ConnectionState {
        *self.shared().state.borrow()
    }

    /// Watch the connection state.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared().state.subscribe()
    }

    /// Whether reconnection attempts were exhausted. The manager does not retry after that.
    pub fn is_offline(&self) -> bool {
        *self.shared().offline.borrow()
    }

    #[allow(missing_docs)]
    pub fn subscribe_offline(&self) -> watch::Receiver<bool> {
        self.shared().offline.subscribe()
    }

    /// Wait until connected. Returns false on timeout or when the manager went offline.
    pub async fn wait_until_connected(&self, timeout: Duration) -> bool {
        let mut state = self.subscribe_state();
        let mut offline = self.subscribe_offline();
        let wait = async {
            tokio::select! {
                connected = state.wait_for(|s| *s == ConnectionState::Connected) => connected.is_ok(),
                _ = offline.wait_for(|offline| *offline) => false,
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    /// Send a raw event. Returns false, and sends nothing, when not connected.
    pub fn emit(&self, event: &str, payload: Value) -> bool {
        let sent = self.shared().send(event, payload);
        if !sent {
            warn!(event, "Not connected, event dropped");
        }
        sent
    }

    /// Listen for `event`. The listener is removed when the returned [`Subscription`] is dropped.
    ///
    /// The handler gets the raw payload, use [`ConnectionManager::decode_push`] to open it.
    pub fn on<F>(&self, event: &str, kind: SubscriptionKind, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared().listeners.add(event, kind, Arc::new(handler))
    }

    /// Remove a listener.
    pub fn off(&self, subscription: Subscription) {
        subscription.unsubscribe();
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.shared().listeners.count(event)
    }

    #[allow(missing_docs)]
    pub fn codec(&self) -> &EnvelopeCodec {
        &self.shared().codec
    }

    /// Default deadline used by [`ConnectionManager::call`].
    pub fn request_timeout(&self) -> Duration {
        self.shared().request_timeout
    }

    /// Open a push event payload.
    ///
    /// Sealed payloads arrive as envelope text. Some events carry plain objects, those are passed
    /// through unchanged.
    pub fn decode_push(&self, payload: &Value) -> Result<Value, CryptoError> {
        match payload {
            Value::String(text) => self.codec().decode_unwrapped(text),
            other => Ok(other.clone()),
        }
    }

    /// Close the connection and stop reconnecting. Pending calls fail with `ConnectionClosed`.
    pub fn shutdown(&self) {
        let shared = self.shared();
        shared.shutdown.cancel();
        shared.lock_link().take();
        shared.set_state(ConnectionState::Disconnected);
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("offline", &self.is_offline())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock_link(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<OutgoingEvent>>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: &str, payload: Value) -> bool {
        let link = self.lock_link();
        let Some(link) = link.as_ref() else {
            return false;
        };
        let sent = link
            .send(OutgoingEvent {
                name: event.to_owned(),
                payload,
            })
            .is_ok();
        if sent {
            debug!(event, "Emitted");
        }
        sent
    }

    fn set_state(&self, new: ConnectionState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == new {
                return false;
            }
            *state = new;
            true
        });
        if changed {
            debug!(state = ?new, "Connection state changed");
        }
    }

    /// Pump inbound events until the link closes. Returns true when stopped by shutdown.
    async fn serve(&self, link: TransportLink, room: Option<&UserId>) -> bool {
        let TransportLink {
            outgoing,
            mut incoming,
        } = link;
        *self.lock_link() = Some(outgoing);

        if let Some(room) = room {
            if !self.send(JOIN_USER_ROOM, Value::from(room)) {
                warn!("Failed to join user room");
            }
        }
        self.set_state(ConnectionState::Connected);

        let cancelled = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break true,
                event = incoming.recv() => match event {
                    Some(event) => {
                        let handled = self.listeners.dispatch(&event.name, &event.payload);
                        if handled == 0 {
                            debug!(event = %event.name, "No listener for event");
                        }
                    }
                    None => break false,
                },
            }
        };

        self.lock_link().take();
        cancelled
    }
}

async fn run<T: Transport>(shared: Arc<Shared>, transport: T, options: ConnectionOptions) {
    let mut attempt = 0;
    loop {
        shared.set_state(if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting { attempt }
        });

        let result = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            result = transport.connect() => result,
        };

        match result {
            Ok(_) if shared.shutdown.is_cancelled() => break,
            Ok(link) => {
                info!("Connected");
                attempt = 0;
                shared.offline.send_replace(false);
                if shared.serve(link, options.room.as_ref()).await {
                    break;
                }
                info!("Connection lost");
            }
            Err(error) => warn!(%error, attempt, "Connection attempt failed"),
        }

        if attempt >= options.reconnection_attempts {
            warn!(
                attempts = options.reconnection_attempts,
                "Giving up reconnecting, going offline"
            );
            shared.offline.send_replace(true);
            break;
        }
        attempt += 1;
        shared.set_state(ConnectionState::Reconnecting { attempt });

        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            _ = tokio::time::sleep(options.reconnection_delay) => {}
        }
    }

    shared.lock_link().take();
    shared.set_state(ConnectionState::Disconnected);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use for4_crypto::EnvelopeKey;
    use serde_json::json;

    use super::*;
    use crate::TestTransport;

    fn test_codec() -> EnvelopeCodec {
        EnvelopeCodec::new(EnvelopeKey::new("test-passphrase", "test-mac-secret"))
    }

    fn options() -> ConnectionOptions {
        ConnectionOptions {
            reconnection_attempts: 3,
            reconnection_delay: Duration::from_millis(1000),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn joins_the_user_room_on_every_connect() {
        let transport = TestTransport::new();
        let manager = ConnectionManager::start(
            transport.clone(),
            test_codec(),
            options().with_room(UserId::Number(7)),
        );

        assert!(manager.wait_until_connected(Duration::from_secs(5)).await);
        transport.wait_for_sent(JOIN_USER_ROOM, 1).await;

        transport.drop_link();
        transport.wait_for_sent(JOIN_USER_ROOM, 2).await;

        assert_eq!(transport.connect_count(), 2);
        assert_eq!(
            transport.sent_named(JOIN_USER_ROOM),
            vec![json!(7), json!(7)]
        );
        assert!(manager.connected());
    }

    #[tokio::test(start_paused = true)]
    async fn goes_offline_after_exhausting_reconnection_attempts() {
        let transport = TestTransport::new();
        transport.fail_next_connects(usize::MAX);
        let manager = ConnectionManager::start(transport.clone(), test_codec(), options());

        let mut offline = manager.subscribe_offline();
        offline.wait_for(|offline| *offline).await.unwrap();
        let mut state = manager.subscribe_state();
        state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();

        // The first attempt plus three reconnections
        assert_eq!(transport.connect_count(), 4);
        assert!(!manager.wait_until_connected(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_retry_succeeds() {
        let transport = TestTransport::new();
        transport.fail_next_connects(2);
        let manager = ConnectionManager::start(transport.clone(), test_codec(), options());

        assert!(manager.wait_until_connected(Duration::from_secs(10)).await);
        assert_eq!(transport.connect_count(), 3);
        assert!(!manager.is_offline());
    }

    #[tokio::test(start_paused = true)]
    async fn emit_while_disconnected_is_a_no_op() {
        let transport = TestTransport::new();
        transport.fail_next_connects(usize::MAX);
        let manager = ConnectionManager::start(transport.clone(), test_codec(), options());

        assert!(!manager.emit("DadosDashboard", json!("sealed")));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_listeners_receive_every_push() {
        let transport = TestTransport::new();
        let manager = ConnectionManager::start(transport.clone(), test_codec(), options());
        assert!(manager.wait_until_connected(Duration::from_secs(5)).await);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = manager.on("new_sale", SubscriptionKind::Persistent, move |payload| {
            let _ = tx.send(payload.clone());
        });

        transport.push("new_sale", json!({ "amount": 1 }));
        transport.push("new_sale", json!({ "amount": 2 }));

        assert_eq!(rx.recv().await, Some(json!({ "amount": 1 })));
        assert_eq!(rx.recv().await, Some(json!({ "amount": 2 })));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_connection() {
        let transport = TestTransport::new();
        let manager = ConnectionManager::start(transport.clone(), test_codec(), options());
        assert!(manager.wait_until_connected(Duration::from_secs(5)).await);

        manager.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.emit("Login", json!("sealed")));
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn decode_push_opens_envelopes_and_passes_objects_through() {
        let transport = TestTransport::new();
        let manager = ConnectionManager::start(transport, test_codec(), options());
        let sealed = test_codec().encode(&json!({ "amount": 10.5 })).unwrap();

        assert_eq!(
            manager.decode_push(&Value::String(sealed)).unwrap(),
            json!({ "amount": 10.5 })
        );
        assert_eq!(
            manager.decode_push(&json!({ "title": "Hi" })).unwrap(),
            json!({ "title": "Hi" })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn handlers_run_for_once_listeners_only_once() {
        let transport = TestTransport::new();
        let manager = ConnectionManager::start(transport.clone(), test_codec(), options());
        assert!(manager.wait_until_connected(Duration::from_secs(5)).await);

        let calls = Arc::new(AtomicUsize::new(0));
        let _sub = manager.on("LoginResponse", SubscriptionKind::Once, {
            let calls = calls.clone();
            move |_: &Value| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });
        transport.push("LoginResponse", json!("a"));
        transport.push("LoginResponse", json!("b"));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.listener_count("LoginResponse"), 0);
    }
}

use std::{collections::VecDeque, sync::Arc};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    bundle_source::AuthBundleSource,
    config::ChannelConfig,
    credentials::Credentials,
    error::ChannelError,
    events::ChannelEvents,
    handshake,
    pending::PendingRequests,
    transport::{ConnectCredential, Connector, Transport, TransportEvent, TransportSender},
};

/// Lifecycle of the reconnect loop.
///
/// `DesiredConnected` does not mean a transport is up, only that the loop keeps trying. Use
/// [`Connection::is_active`] for the former.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No reconnect loop is running.
    Disconnected,
    /// The reconnect loop is running.
    DesiredConnected,
    /// The reconnect loop has been told to stop and has not settled yet.
    Disconnecting,
}

#[derive(Default)]
struct Outbound {
    queue: VecDeque<String>,
    active: Option<TransportSender>,
}

pub(crate) struct Inner {
    pub(crate) config: ChannelConfig,
    connector: Box<dyn Connector>,
    bundles: Box<dyn AuthBundleSource>,
    events: Box<dyn ChannelEvents>,

    state: watch::Sender<ConnectionState>,
    pub(crate) credentials: Mutex<Credentials>,
    outbound: Mutex<Outbound>,
    pub(crate) pending: PendingRequests,
    // Current transport from open until the attempt ends, handshake included
    transport: Mutex<Option<TransportSender>>,
}

/// A password authenticated channel that reconnects on its own.
///
/// # Lifecycle
///
/// 1. Create with [`new()`](Connection::new)
/// 2. [`connect()`](Connection::connect) derives keys and resolves on the first accepted
///    handshake. Later losses are retried in the background and reported through
///    [`ChannelEvents`]
/// 3. [`send()`](Connection::send) at any time. While no transport is active messages are queued
///    and flushed in order once one is
/// 4. [`disconnect()`](Connection::disconnect) stops the loop
///
/// # Examples
///
/// ```no_run
/// use authlink_channel::{
///     ChannelConfig, ChannelEvent, Connection, HttpAuthBundleSource, WebSocketConnector,
/// };
///
/// # async fn example() -> Result<(), authlink_channel::ChannelError> {
/// let (events, mut incoming) = tokio::sync::mpsc::unbounded_channel::<ChannelEvent>();
/// let connection = Connection::new(
///     ChannelConfig::default(),
///     WebSocketConnector::new("ws://localhost:8001/connect"),
///     HttpAuthBundleSource::new("http://localhost:8001/auth.json"),
///     events,
/// );
///
/// connection.connect("correct horse battery staple").await?;
/// connection.send(&serde_json::json!({ "type": "ping" })).await?;
///
/// while let Some(event) = incoming.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    pub(crate) inner: Arc<Inner>,
}

impl Connection {
    /// Create a disconnected channel.
    pub fn new(
        config: ChannelConfig,
        connector: impl Connector + 'static,
        bundles: impl AuthBundleSource + 'static,
        events: impl ChannelEvents + 'static,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                connector: Box::new(connector),
                bundles: Box::new(bundles),
                events: Box::new(events),
                state,
                credentials: Mutex::new(Credentials::default()),
                outbound: Mutex::new(Outbound::default()),
                pending: PendingRequests::default(),
                transport: Mutex::new(None),
            }),
        }
    }

    /// Start the reconnect loop with `password` and wait for the first accepted handshake.
    ///
    /// If a disconnect is still settling this waits for it first. Fails with
    /// [`ChannelError::AlreadyConnected`] if the loop is already running, with
    /// [`ChannelError::Fetch`] if the auth bundle cannot be retrieved, with
    /// [`ChannelError::RetriesExhausted`] once every attempt failed, and with
    /// [`ChannelError::Disconnected`] if [`disconnect()`](Connection::disconnect) is called first.
    pub async fn connect(&self, password: &str) -> Result<(), ChannelError> {
        let mut state = self.inner.state.subscribe();
        let _ = state
            .wait_for(|s| *s != ConnectionState::Disconnecting)
            .await;
        let claimed = self.inner.state.send_if_modified(|s| {
            if *s == ConnectionState::Disconnected {
                *s = ConnectionState::DesiredConnected;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(ChannelError::AlreadyConnected);
        }

        {
            let mut credentials = self.inner.credentials.lock().await;
            credentials.set_password(password);
            match credentials.keys(&*self.inner.bundles).await {
                Ok(_) | Err(ChannelError::InvalidCredentials(_)) => {}
                Err(e) => {
                    self.inner.state.send_replace(ConnectionState::Disconnected);
                    return Err(e);
                }
            }
        }

        let (connected_tx, connected_rx) = oneshot::channel();
        tokio::spawn(self.inner.clone().connect_loop(connected_tx));
        connected_rx.await.unwrap_or(Err(ChannelError::Disconnected))
    }

    /// Stop the reconnect loop and wait until it has settled.
    ///
    /// Closes the live transport, if any. Does nothing when already disconnected.
    pub async fn disconnect(&self) {
        self.inner.state.send_if_modified(|s| {
            if *s == ConnectionState::DesiredConnected {
                *s = ConnectionState::Disconnecting;
                true
            } else {
                false
            }
        });
        if let Some(transport) = self.inner.transport.lock().await.as_ref() {
            transport.close();
        }

        let mut state = self.inner.state.subscribe();
        let _ = state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await;
    }

    /// Send an application message, or queue it until the channel is active.
    pub async fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), ChannelError> {
        let text = serde_json::to_string(message)?;
        self.inner.send_text(text).await;
        Ok(())
    }

    /// Check `password` against the published identity without connecting.
    ///
    /// The password becomes the active one, as with [`connect()`](Connection::connect).
    pub async fn verify_password(&self, password: &str) -> Result<bool, ChannelError> {
        let mut credentials = self.inner.credentials.lock().await;
        credentials.set_password(password);
        match credentials.keys(&*self.inner.bundles).await {
            Ok(_) => Ok(true),
            Err(ChannelError::InvalidCredentials(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[allow(missing_docs)]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Whether a transport is past its handshake and messages flow immediately.
    pub async fn is_active(&self) -> bool {
        self.inner.outbound.lock().await.active.is_some()
    }

    /// Watch [`ConnectionState`] transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }
}

impl Inner {
    fn is_desired(&self) -> bool {
        *self.state.borrow() == ConnectionState::DesiredConnected
    }

    pub(crate) async fn send_text(&self, text: String) {
        let mut outbound = self.outbound.lock().await;
        if let Some(active) = &outbound.active {
            if active.send(text.clone()).is_ok() {
                return;
            }
            // Closed under us, keep the message for the next transport
            outbound.active = None;
        }
        debug!(queued = outbound.queue.len() + 1, "Channel not active, queueing message");
        outbound.queue.push_back(text);
    }

    /// Send on the active transport only. Never queues.
    pub(crate) async fn send_active(&self, text: String) -> Result<(), ChannelError> {
        let outbound = self.outbound.lock().await;
        match &outbound.active {
            Some(active) => active.send(text),
            None => Err(ChannelError::TransportClosed),
        }
    }

    pub(crate) async fn close_transport(&self) {
        if let Some(transport) = self.transport.lock().await.as_ref() {
            transport.close();
        }
    }

    async fn activate(&self, sender: TransportSender) {
        let mut outbound = self.outbound.lock().await;
        while let Some(text) = outbound.queue.pop_front() {
            if let Err(e) = sender.send(text.clone()) {
                outbound.queue.push_front(text);
                debug!(error = %e, "Transport closed while flushing the queue");
                return;
            }
        }
        outbound.active = Some(sender);
    }

    async fn deactivate(&self) {
        self.outbound.lock().await.active = None;
    }

    async fn connect_loop(
        self: Arc<Self>,
        connected: oneshot::Sender<Result<(), ChannelError>>,
    ) {
        let mut connected = Some(connected);
        let mut attempt: u32 = 0;
        let mut state = self.state.subscribe();

        while self.is_desired() {
            let cause = tokio::select! {
                cause = self.run_attempt(&mut attempt, &mut connected) => cause,
                _ = stopped(&mut state) => break,
            };
            *self.transport.lock().await = None;

            attempt += 1;
            if attempt >= self.config.max_attempts {
                error!(attempts = attempt, error = %cause, "Giving up on the connection");
                let error = ChannelError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(cause),
                };
                match connected.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(error));
                    }
                    None => self.events.on_error(&error),
                }
                break;
            }

            // Only a connection that worked before counts as lost
            if connected.is_none() && self.is_desired() {
                self.events.on_disconnect(&cause);
            }

            let delay = self.config.backoff(attempt);
            debug!(attempt, ?delay, error = %cause, "Connection attempt failed, retrying");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut state) => break,
            }
        }

        *self.transport.lock().await = None;
        self.deactivate().await;
        if let Some(tx) = connected.take() {
            let _ = tx.send(Err(ChannelError::Disconnected));
        }
        self.state.send_replace(ConnectionState::Disconnected);
        debug!("Connection loop stopped");
    }

    /// One connection attempt, from opening the transport until it is lost.
    async fn run_attempt(
        &self,
        attempt: &mut u32,
        connected: &mut Option<oneshot::Sender<Result<(), ChannelError>>>,
    ) -> ChannelError {
        let mut transport = match self.establish().await {
            Ok(transport) => transport,
            Err(e) => {
                self.deactivate().await;
                return e;
            }
        };

        self.activate(transport.sender()).await;
        *attempt = 0;
        match connected.take() {
            Some(tx) => {
                info!("Connected");
                let _ = tx.send(Ok(()));
            }
            None => {
                info!("Reconnected");
                self.events.on_reconnected();
            }
        }

        self.serve(&mut transport).await
    }

    async fn establish(&self) -> Result<Transport, ChannelError> {
        self.deactivate().await;

        let (bundle, keys) = self
            .credentials
            .lock()
            .await
            .keys(&*self.bundles)
            .await?;
        let credential = ConnectCredential::new(
            self.config.credential_name.clone(),
            keys.sign(&bundle.static_challenge).to_hex(),
        );

        debug!("Connecting");
        let mut transport = self.connector.open(&credential).await?;
        *self.transport.lock().await = Some(transport.sender());

        handshake::perform(&mut transport, &keys, self.config.handshake_timeout).await?;
        Ok(transport)
    }

    /// Dispatch inbound messages until the transport ends. Returns why it ended.
    async fn serve(&self, transport: &mut Transport) -> ChannelError {
        loop {
            match transport.next_event().await {
                TransportEvent::Message(text) => {
                    if let Err(e) = self.dispatch(&text).await {
                        self.fatal(transport, &e).await;
                        return e;
                    }
                }
                TransportEvent::Error(reason) => {
                    self.deactivate().await;
                    warn!(%reason, "Transport error");
                    return ChannelError::Transport(reason);
                }
                TransportEvent::Closed => {
                    self.deactivate().await;
                    info!("Transport closed");
                    return ChannelError::TransportClosed;
                }
            }
        }
    }

    async fn dispatch(&self, text: &str) -> Result<(), ChannelError> {
        let message: Value = serde_json::from_str(text)
            .map_err(|e| ChannelError::MalformedMessage(e.to_string()))?;

        if self.pending.resolve(&message).await {
            return Ok(());
        }
        if let Err(e) = self.events.on_message(message) {
            error!(error = %e, "Unhandled error in message handler");
        }
        Ok(())
    }

    /// Tear the connection down after the stream became untrustworthy.
    async fn fatal(&self, transport: &Transport, error: &ChannelError) {
        error!(%error, "Connection fatal error");
        self.deactivate().await;
        transport.close();
        self.events.on_error(error);
        // Last, the loop stops as soon as it observes this
        self.state.send_if_modified(|s| {
            if *s == ConnectionState::DesiredConnected {
                *s = ConnectionState::Disconnecting;
                true
            } else {
                false
            }
        });
    }
}

async fn stopped(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state
        .wait_for(|s| *s != ConnectionState::DesiredConnected)
        .await;
}

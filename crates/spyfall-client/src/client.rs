//! `LobbyClient` builder, connection lifecycle, and inbound loop.
//!
//! This is the shim between UI intents and the network. It ties the
//! layers together: transport → protocol → broker.
//!
//! One client owns at most one connection at a time. While it is open a
//! background task reads frames, unpacks them and hands them to the
//! broker, so listeners run one after another on that task in arrival
//! order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use spyfall_protocol::{
    Codec, CreateGame, DestroyGame, GameId, Intent, JoinGame, JsonCodec, LeaveGame,
    OutboundIntent, ProtocolError, ResponseError, StartGame, StopGame, WireMessage,
};
use spyfall_transport::{Connection, ConnectionId, Connector, TransportError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{ClientConfig, ClientError, ConnectionState, MessageBroker};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Observable outcomes that don't belong to any single call.
///
/// Failures in the background (a dropped connection, a frame that won't
/// parse) have no caller to return an error to, so they are published
/// here instead. Subscribe with [`LobbyClient::events`]; nobody is forced
/// to listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection moved between lifecycle states.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// The transport failed (connect, send, or receive).
    TransportError(String),
    /// An inbound frame or payload couldn't be decoded.
    ProtocolError(String),
    /// The server answered a request under `msg_type` with a refusal.
    Rejected {
        msg_type: String,
        error: ResponseError,
    },
    /// The connection is gone, whoever ended it.
    Closed,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// The lifecycle state plus which connection it describes.
///
/// `current` lets a reader task that outlived its connection recognise
/// that it no longer speaks for the client.
#[derive(Debug, Default)]
struct Lifecycle {
    state: ConnectionState,
    current: Option<ConnectionId>,
}

/// State shared between the client handle and its reader task.
struct Shared<K: Codec> {
    codec: K,
    broker: MessageBroker,
    events: broadcast::Sender<ClientEvent>,
    lifecycle: Mutex<Lifecycle>,
}

impl<K: Codec> Shared<K> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ClientEvent) {
        // No receivers is fine: events are opt-in.
        let _ = self.events.send(event);
    }

    /// Applies a transition and publishes it.
    fn transition(
        &self,
        lifecycle: &mut Lifecycle,
        to: ConnectionState,
    ) -> Result<(), ClientError> {
        let from = lifecycle.state.transition(to)?;
        tracing::debug!(%from, %to, "connection state changed");
        self.emit(ClientEvent::StateChanged { from, to });
        Ok(())
    }

    /// Unpacks a raw frame and routes it. Returns how many listeners ran.
    fn handle_message(&self, raw: &[u8]) -> Result<usize, ProtocolError> {
        let message = match self.codec.unpack(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, len = raw.len(), "dropping malformed message");
                self.emit(ClientEvent::ProtocolError(e.to_string()));
                return Err(e);
            }
        };
        tracing::trace!(msg_type = %message.msg_type, "message received");
        Ok(self.broker.dispatch(&message))
    }

    /// Marks connection `id` as gone, if it is still the current one.
    fn connection_lost(&self, id: ConnectionId, error: Option<String>) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.current != Some(id) {
            return;
        }
        lifecycle.current = None;
        if let Some(error) = error {
            self.emit(ClientEvent::TransportError(error));
        }
        if self.transition(&mut lifecycle, ConnectionState::Closed).is_ok() {
            self.emit(ClientEvent::Closed);
        }
    }
}

/// The open connection and the task reading from it.
struct Link<T> {
    conn: Arc<T>,
    reader: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`LobbyClient`].
///
/// # Example
///
/// ```rust,no_run
/// use spyfall_client::prelude::*;
///
/// # async fn demo() -> Result<(), ClientError> {
/// let client = ClientBuilder::new()
///     .config(ClientConfig::from_env())
///     .build(WebSocketConnector);
///
/// client.subscribe_typed("JOIN_GAME", |joined: GameJoined| {
///     println!("{} joined {}", joined.username, joined.game_id);
/// });
/// client.open_configured().await?;
/// client.create_game("bob").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds a client that speaks JSON over `connector`.
    pub fn build<C: Connector>(self, connector: C) -> LobbyClient<C, JsonCodec> {
        self.build_with_codec(connector, JsonCodec)
    }

    /// Builds a client with a custom codec.
    pub fn build_with_codec<C: Connector, K: Codec>(
        self,
        connector: C,
        codec: K,
    ) -> LobbyClient<C, K> {
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        LobbyClient {
            connector,
            config: self.config,
            shared: Arc::new(Shared {
                codec,
                broker: MessageBroker::new(),
                events,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
            link: tokio::sync::Mutex::new(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// The lobby client: one connection, one broker, typed outcomes.
///
/// Create it once and pass it (usually in an `Arc`) to whatever needs to
/// send or listen. All methods take `&self`.
pub struct LobbyClient<C: Connector, K: Codec = JsonCodec> {
    connector: C,
    config: ClientConfig,
    shared: Arc<Shared<K>>,
    link: tokio::sync::Mutex<Option<Link<C::Connection>>>,
}

impl<C: Connector, K: Codec> LobbyClient<C, K> {
    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle().state
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribes to the client's event stream.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    /// A handle for publishing on the event stream from listeners.
    pub(crate) fn event_sender(&self) -> broadcast::Sender<ClientEvent> {
        self.shared.events.clone()
    }

    // -- Lifecycle --

    /// Connects to the URL assembled from [`ClientConfig`].
    ///
    /// # Errors
    /// [`ClientError::Config`] if no usable URL is configured, otherwise
    /// whatever [`open`](Self::open) returns.
    pub async fn open_configured(&self) -> Result<(), ClientError> {
        let url = self.config.ws_url()?;
        self.open(&url).await
    }

    /// Connects to `url`.
    ///
    /// Valid from `idle` and `closed`; the latter is how a client
    /// reconnects. There is no retry and no timeout: a failed attempt
    /// leaves the client `closed` and reports the error.
    ///
    /// # Errors
    /// - [`ClientError::InvalidTransition`]: already connecting or open
    /// - [`ClientError::Transport`]: the connector failed
    pub async fn open(&self, url: &str) -> Result<(), ClientError> {
        {
            let mut lifecycle = self.shared.lifecycle();
            self.shared
                .transition(&mut lifecycle, ConnectionState::Connecting)?;
        }
        tracing::info!(url, "connecting to lobby server");

        // Anything left from a previous connection is dead by now.
        if let Some(old) = self.link.lock().await.take() {
            old.reader.abort();
        }

        let conn = match self.connector.connect(url).await {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                tracing::warn!(url, error = %e, "connection failed");
                self.shared.emit(ClientEvent::TransportError(e.to_string()));
                let mut lifecycle = self.shared.lifecycle();
                // Connecting → Closed is always valid here.
                let _ = self.shared.transition(&mut lifecycle, ConnectionState::Closed);
                return Err(e.into());
            }
        };
        let id = conn.id();

        let mut link = self.link.lock().await;
        self.shared.lifecycle().current = Some(id);
        let reader = tokio::spawn(read_loop(Arc::clone(&conn), Arc::clone(&self.shared)));
        *link = Some(Link {
            conn: Arc::clone(&conn),
            reader,
        });

        let mut lifecycle = self.shared.lifecycle();
        if lifecycle.current != Some(id) {
            // The reader already saw the connection die.
            return Err(TransportError::ConnectionClosed("closed while opening".into()).into());
        }
        self.shared.transition(&mut lifecycle, ConnectionState::Open)?;
        tracing::info!(%id, url, "connected to lobby server");
        Ok(())
    }

    /// Closes the connection, the equivalent of the page unloading.
    ///
    /// Does nothing unless the client is `open`.
    ///
    /// # Errors
    /// [`ClientError::Transport`] if the transport fails to close cleanly;
    /// the client is `closed` either way.
    pub async fn close(&self) -> Result<(), ClientError> {
        {
            let mut lifecycle = self.shared.lifecycle();
            if !lifecycle.state.is_open() {
                tracing::debug!(state = %lifecycle.state, "close ignored, not open");
                return Ok(());
            }
            lifecycle.current = None;
            self.shared.transition(&mut lifecycle, ConnectionState::Closed)?;
        }
        self.shared.emit(ClientEvent::Closed);
        tracing::info!("closing connection");

        let Some(link) = self.link.lock().await.take() else {
            return Ok(());
        };
        link.reader.abort();
        link.conn.close().await.map_err(|e| {
            tracing::debug!(error = %e, "transport close failed");
            ClientError::from(e)
        })
    }

    // -- Outbound --

    /// Packs `intent` and transmits it as exactly one message.
    ///
    /// Only works while `open`. Otherwise nothing is sent and nothing is
    /// kept for later: an intent issued before the connection opens is
    /// lost.
    ///
    /// # Errors
    /// - [`ClientError::NotOpen`]: not connected; no transmission happened
    /// - [`ClientError::Protocol`]: the intent couldn't be packed
    /// - [`ClientError::Transport`]: the send failed; the client is now
    ///   `closed`
    pub async fn send(&self, intent: OutboundIntent) -> Result<(), ClientError> {
        let state = self.state();
        if !state.is_open() {
            tracing::debug!(msg_type = %intent.msg_type, %state, "send dropped, connection not open");
            return Err(ClientError::NotOpen { state });
        }

        let bytes = self.shared.codec.pack_intent(&intent)?;

        let conn = self
            .link
            .lock()
            .await
            .as_ref()
            .map(|link| Arc::clone(&link.conn));
        let Some(conn) = conn else {
            return Err(ClientError::NotOpen {
                state: self.state(),
            });
        };

        if let Err(e) = conn.send(&bytes).await {
            tracing::warn!(msg_type = %intent.msg_type, error = %e, "send failed");
            self.shared.connection_lost(conn.id(), Some(e.to_string()));
            return Err(e.into());
        }
        tracing::debug!(msg_type = %intent.msg_type, "message sent");
        Ok(())
    }

    /// Sends one of the typed payloads.
    ///
    /// # Errors
    /// Same as [`send`](Self::send).
    pub async fn send_payload<T: Intent>(&self, payload: &T) -> Result<(), ClientError> {
        self.send(OutboundIntent::from_payload(payload)?).await
    }

    /// Creates a game and joins it as `username`.
    ///
    /// # Errors
    /// Same as [`send`](Self::send).
    pub async fn create_game(&self, username: &str) -> Result<(), ClientError> {
        self.send_payload(&CreateGame {
            username: username.to_string(),
        })
        .await
    }

    /// Joins game `id` as `username`. An empty id lets the server choose.
    ///
    /// # Errors
    /// Same as [`send`](Self::send).
    pub async fn join_game(
        &self,
        id: impl Into<GameId>,
        username: &str,
    ) -> Result<(), ClientError> {
        self.send_payload(&JoinGame {
            game_id: id.into(),
            username: username.to_string(),
        })
        .await
    }

    /// Leaves the current game.
    ///
    /// # Errors
    /// Same as [`send`](Self::send).
    pub async fn leave_game(&self) -> Result<(), ClientError> {
        self.send_payload(&LeaveGame {}).await
    }

    /// Destroys the current game for every player in it.
    ///
    /// # Errors
    /// Same as [`send`](Self::send).
    pub async fn destroy_game(&self) -> Result<(), ClientError> {
        self.send_payload(&DestroyGame {}).await
    }

    /// Starts a round.
    ///
    /// # Errors
    /// Same as [`send`](Self::send).
    pub async fn start_game(&self) -> Result<(), ClientError> {
        self.send_payload(&StartGame {}).await
    }

    /// Stops the running round.
    ///
    /// # Errors
    /// Same as [`send`](Self::send).
    pub async fn stop_game(&self) -> Result<(), ClientError> {
        self.send_payload(&StopGame {}).await
    }

    // -- Inbound --

    /// Registers `listener` for inbound messages tagged `msg_type`.
    ///
    /// Subscriptions may be made before or after `open` and survive
    /// reconnects.
    pub fn subscribe<F>(&self, msg_type: impl Into<String>, listener: F)
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        self.shared.broker.subscribe(msg_type, listener);
    }

    /// Registers a listener that receives `data` already decoded as `T`.
    ///
    /// A message whose `data` doesn't decode is skipped for this listener,
    /// logged, and published as [`ClientEvent::ProtocolError`].
    pub fn subscribe_typed<T, F>(&self, msg_type: impl Into<String>, listener: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let events = self.shared.events.clone();
        self.shared
            .broker
            .subscribe(msg_type, move |message: &WireMessage| {
                match message.data_as::<T>() {
                    Ok(value) => listener(value),
                    Err(e) => {
                        tracing::warn!(msg_type = %message.msg_type, error = %e, "payload did not decode");
                        let _ = events.send(ClientEvent::ProtocolError(e.to_string()));
                    }
                }
            });
    }

    /// Unpacks a raw inbound frame and routes it to its listeners.
    ///
    /// The reader task calls this for every frame; it is public so frames
    /// from elsewhere (replays, tests) go through the same path. Returns
    /// the number of listeners that ran, `0` for an unknown type.
    ///
    /// # Errors
    /// [`ProtocolError`] for a frame that isn't a valid message. No
    /// listener runs in that case.
    pub fn handle_message(&self, raw: &[u8]) -> Result<usize, ProtocolError> {
        self.shared.handle_message(raw)
    }
}

impl<C: Connector, K: Codec> Drop for LobbyClient<C, K> {
    fn drop(&mut self) {
        // The reader holds its own Arcs; stop it so the connection goes too.
        if let Some(link) = self.link.get_mut().take() {
            link.reader.abort();
        }
    }
}

impl<C: Connector, K: Codec> std::fmt::Debug for LobbyClient<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbyClient")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("broker", &self.shared.broker)
            .finish_non_exhaustive()
    }
}

/// Reads frames until the connection ends, dispatching each one.
async fn read_loop<T: Connection, K: Codec>(conn: Arc<T>, shared: Arc<Shared<K>>) {
    let id = conn.id();
    loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                // Malformed frames are already logged and published.
                let _ = shared.handle_message(&data);
            }
            Ok(None) => {
                tracing::info!(%id, "connection closed by server");
                shared.connection_lost(id, None);
                break;
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "connection error");
                shared.connection_lost(id, Some(e.to_string()));
                break;
            }
        }
    }
}

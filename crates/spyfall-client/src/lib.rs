//! # Spyfall lobby client
//!
//! Connection and message dispatch for the Spyfall game lobby.
//!
//! A [`LobbyClient`] owns a single connection to the lobby server. UI code
//! calls intent methods ([`LobbyClient::create_game`],
//! [`LobbyClient::join_game`], ...) to send, and registers listeners per
//! message type to receive. Failures come back as [`ClientError`]s or,
//! when nobody called anything, on the [`ClientEvent`] stream.
//!
//! ```text
//! UI ─ intents ─→ LobbyClient ─ pack ─→ Connection ─→ server
//! UI ←─ listeners ─ MessageBroker ←─ unpack ─ reader task ←─┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spyfall_client::prelude::*;
//!
//! # async fn demo() -> Result<(), ClientError> {
//! let client = ClientBuilder::new()
//!     .config(ClientConfig::default().api_url("localhost:8080"))
//!     .build(WebSocketConnector);
//!
//! client.subscribe_typed(message_type::JOIN_GAME, |joined: GameJoined| {
//!     println!("in game {}", joined.game_id);
//! });
//!
//! client.open_configured().await?;
//! client.join_game("abc123", "alice").await?;
//! # Ok(())
//! # }
//! ```

mod broker;
mod client;
mod config;
mod error;
mod state;
pub mod store;

pub use broker::{Listener, MessageBroker};
pub use client::{ClientBuilder, ClientEvent, LobbyClient};
pub use config::{API_URL_ENV, ClientConfig};
pub use error::{ClientError, ConfigError};
pub use state::ConnectionState;

/// Everything a typical consumer needs in one import.
pub mod prelude {
    pub use crate::store::{Action, RootState, Store, bind_store};
    pub use crate::{
        ClientBuilder, ClientConfig, ClientError, ClientEvent, ConfigError, ConnectionState,
        LobbyClient, MessageBroker,
    };
    pub use spyfall_protocol::{
        Codec, ErrorCode, GameId, GameJoined, JsonCodec, LobbyResponse, OutboundIntent,
        ProtocolError, Reply, ResponseError, WireMessage, message_type,
    };
    pub use spyfall_transport::{
        Connection, Connector, MemoryConnector, MemoryListener, MemoryPeer, TransportError,
        WebSocketConnector,
    };
}

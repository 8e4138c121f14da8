//! Wire protocol for the Spyfall lobby client.
//!
//! This crate defines the "language" the client and the lobby server speak:
//!
//! - **Types** ([`WireMessage`], [`OutboundIntent`], the lobby payloads):
//!   what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   packed into and unpacked from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the client's
//! dispatch layer (listeners keyed by message type). It knows nothing about
//! connections or listeners.
//!
//! ```text
//! Transport (bytes) → Protocol (WireMessage) → Client (listeners)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    CreateGame, DestroyGame, ErrorCode, GameId, GameJoined, Intent, JoinGame, LeaveGame,
    LobbyResponse, OutboundIntent, Reply, ResponseError, StartGame, StopGame, WireMessage,
    message_type,
};

//! Unified error type for the lobby client.

use spyfall_protocol::ProtocolError;
use spyfall_transport::TransportError;

use crate::ConnectionState;

/// Configuration problems found before any connection is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No backend host was configured (`API_URL` unset or empty).
    #[error("no API URL configured (set API_URL to host[:port])")]
    MissingApiUrl,

    /// The assembled URL doesn't parse.
    #[error("invalid API URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The scheme is something other than `ws` or `wss`.
    #[error("unsupported URL scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),
}

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attributes let `?` lift transport, protocol and config
/// errors straight into a `ClientError`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, missing type tag).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection URL could not be built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An intent was sent while the connection wasn't open. Nothing was
    /// transmitted and nothing was queued.
    #[error("connection is {state}, not open")]
    NotOpen { state: ConnectionState },

    /// The requested lifecycle step isn't valid from the current state
    /// (e.g. `open` while already open).
    #[error("cannot go from {from} to {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}

impl From<(ConnectionState, ConnectionState)> for ClientError {
    fn from((from, to): (ConnectionState, ConnectionState)) -> Self {
        Self::InvalidTransition { from, to }
    }
}

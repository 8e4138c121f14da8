//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means the bytes or the JSON were the problem,
//! never the network.

/// Errors that can occur while packing or unpacking messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types,
    /// or a `data` document that doesn't match the expected payload.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message parsed but breaks a protocol rule, e.g. it carries no
    /// type tag to route on.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

//! Core protocol types for the lobby's wire format.
//!
//! Every message on the wire, in either direction, is a [`WireMessage`]:
//! a `type` key used for routing plus a `data` field carrying a JSON
//! document as *text*. The lobby server parses that embedded text a second
//! time, so the client has to nest it the same way:
//!
//! ```text
//! {"type":"JOIN_GAME","data":"{\"gameId\":\"abc123\",\"username\":\"alice\"}"}
//! ```
//!
//! The typed payloads further down ([`CreateGame`], [`GameJoined`], ...)
//! are what goes *inside* `data`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Message type keys
// ---------------------------------------------------------------------------

/// The routing keys used by the lobby.
///
/// Plain `&str` constants rather than an enum: the broker routes on
/// arbitrary strings, and a server may well introduce keys this crate
/// doesn't know about yet.
pub mod message_type {
    /// Client → Server: create a game and join it as its first player.
    pub const CREATE_GAME: &str = "CREATE_GAME";
    /// Both directions: join a game by id; the server answers under the
    /// same key with the game the player ended up in.
    pub const JOIN_GAME: &str = "JOIN_GAME";
    /// Client → Server: leave the current game.
    pub const LEAVE_GAME: &str = "LEAVE_GAME";
    /// Client → Server: tear the current game down for everyone.
    pub const DESTROY_GAME: &str = "DESTROY_GAME";
    /// Client → Server: start the round.
    pub const START_GAME: &str = "START_GAME";
    /// Client → Server: stop the round.
    pub const STOP_GAME: &str = "STOP_GAME";
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A game's public id (the short code players type in to join).
///
/// Serialized as a plain string. Empty is allowed: joining with an empty
/// id asks the server to pick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the "let the server decide" id.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for GameId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// WireMessage: the envelope
// ---------------------------------------------------------------------------

/// The envelope every frame is wrapped in.
///
/// `data` always holds JSON *text*. On the way in we are lenient: the
/// server sometimes inlines the document instead of embedding it as a
/// string, so both shapes are accepted and normalized to text. A missing
/// or `null` `data` becomes the text `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// The routing key. Never empty once a message has been unpacked.
    #[serde(rename = "type", default)]
    pub msg_type: String,

    /// Embedded JSON document.
    #[serde(default = "null_text", deserialize_with = "embedded_json")]
    pub data: String,
}

impl WireMessage {
    /// Builds a message from a key and already-serialized JSON text.
    pub fn new(msg_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            data: data.into(),
        }
    }

    /// Parses the embedded `data` document into `T`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if `data` is not valid JSON or
    /// doesn't match `T`'s shape.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_str(&self.data).map_err(ProtocolError::Decode)
    }

    /// Checks the envelope invariants: the type tag must be present.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] for an empty type tag.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.msg_type.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "message has no type tag".into(),
            ));
        }
        Ok(())
    }
}

impl From<OutboundIntent> for WireMessage {
    fn from(intent: OutboundIntent) -> Self {
        Self {
            msg_type: intent.msg_type,
            data: intent.data,
        }
    }
}

fn null_text() -> String {
    "null".to_string()
}

/// Accepts `data` as embedded JSON text or as an inline JSON value.
fn embedded_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Data {
        Text(String),
        Inline(serde_json::Value),
    }

    Ok(match Option::<Data>::deserialize(deserializer)? {
        Some(Data::Text(text)) => text,
        Some(Data::Inline(value)) => value.to_string(),
        None => null_text(),
    })
}

// ---------------------------------------------------------------------------
// OutboundIntent: what the UI asks us to send
// ---------------------------------------------------------------------------

/// A user action on its way to the server.
///
/// Built fresh for every send and consumed by packing; nothing holds on
/// to intents after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundIntent {
    /// The routing key, e.g. [`message_type::CREATE_GAME`].
    pub msg_type: String,
    /// The JSON text that will travel in the envelope's `data` field.
    pub data: String,
}

impl OutboundIntent {
    /// Builds an intent from a key and JSON text.
    pub fn new(msg_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            data: data.into(),
        }
    }

    /// Builds an intent from one of the typed payloads.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the payload can't be serialized.
    pub fn from_payload<T: Intent>(payload: &T) -> Result<Self, ProtocolError> {
        let data = serde_json::to_string(payload).map_err(ProtocolError::Encode)?;
        Ok(Self::new(T::TYPE, data))
    }
}

/// A typed payload that is always sent under the same key.
pub trait Intent: Serialize {
    /// The routing key this payload travels under.
    const TYPE: &'static str;
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// Create a new game; the creator joins it as `username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGame {
    pub username: String,
}

impl Intent for CreateGame {
    const TYPE: &'static str = message_type::CREATE_GAME;
}

/// Join an existing game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGame {
    pub game_id: GameId,
    pub username: String,
}

impl Intent for JoinGame {
    const TYPE: &'static str = message_type::JOIN_GAME;
}

/// Leave the game this connection is in. Carries no fields; the server
/// knows the player from the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveGame {}

impl Intent for LeaveGame {
    const TYPE: &'static str = message_type::LEAVE_GAME;
}

/// Destroy the game this connection is in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyGame {}

impl Intent for DestroyGame {
    const TYPE: &'static str = message_type::DESTROY_GAME;
}

/// Start a round in the current game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGame {}

impl Intent for StartGame {
    const TYPE: &'static str = message_type::START_GAME;
}

/// Stop the running round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopGame {}

impl Intent for StopGame {
    const TYPE: &'static str = message_type::STOP_GAME;
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// Server → Client under `JOIN_GAME`: the game a player is now in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameJoined {
    pub game_id: GameId,
    pub username: String,
}

/// The server's generic reply body.
///
/// The server spells the success flag `sucess`; the correct spelling is
/// accepted too so a fixed server keeps working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyResponse {
    #[serde(rename = "sucess", alias = "success", default)]
    pub success: bool,

    /// The game code the reply refers to, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

/// Why a request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,

    #[serde(
        rename = "description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

/// Error codes the lobby server reports.
///
/// Serialized as the server's SCREAMING_SNAKE_CASE strings. Codes this
/// client doesn't know are preserved in [`ErrorCode::Unknown`] instead of
/// failing the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    Other,
    GameExists,
    GameNotFound,
    GameNotRemoved,
    GameInProgress,
    PlayerExists,
    PlayerNotFound,
    PlayerNotRemoved,
    NoGameCode,
    NoUsername,
    InvalidUserName,
    Unknown(String),
}

impl ErrorCode {
    /// The wire spelling of this code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Other => "OTHER_ERROR",
            Self::GameExists => "GAME_EXISTS_ERROR",
            Self::GameNotFound => "GAME_NOT_FOUND_ERROR",
            Self::GameNotRemoved => "GAME_NOT_REMOVED_ERROR",
            Self::GameInProgress => "GAME_IN_PROGRESS",
            Self::PlayerExists => "PLAYER_EXISTS_ERROR",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND_ERROR",
            Self::PlayerNotRemoved => "PLAYER_NOT_REMOVED_ERROR",
            Self::NoGameCode => "NO_GAME_CODE_ERROR",
            Self::NoUsername => "NO_USERNAME_ERROR",
            Self::InvalidUserName => "INVALID_USER_NAME_ERROR",
            Self::Unknown(code) => code.as_str(),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "OTHER_ERROR" => Self::Other,
            "GAME_EXISTS_ERROR" => Self::GameExists,
            "GAME_NOT_FOUND_ERROR" => Self::GameNotFound,
            "GAME_NOT_REMOVED_ERROR" => Self::GameNotRemoved,
            "GAME_IN_PROGRESS" => Self::GameInProgress,
            "PLAYER_EXISTS_ERROR" => Self::PlayerExists,
            "PLAYER_NOT_FOUND_ERROR" => Self::PlayerNotFound,
            "PLAYER_NOT_REMOVED_ERROR" => Self::PlayerNotRemoved,
            "NO_GAME_CODE_ERROR" => Self::NoGameCode,
            "NO_USERNAME_ERROR" => Self::NoUsername,
            "INVALID_USER_NAME_ERROR" => Self::InvalidUserName,
            _ => Self::Unknown(code),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Unknown(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reply outcomes
// ---------------------------------------------------------------------------

/// How the server answered a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// The request went through.
    Accepted(T),
    /// The server refused it.
    Rejected(ResponseError),
}

impl ResponseError {
    /// Stands in for a failure the server didn't explain.
    pub fn unspecified() -> Self {
        Self {
            code: ErrorCode::Other,
            description: None,
        }
    }
}

impl LobbyResponse {
    /// `true` when the flag is set and no error is attached.
    ///
    /// Some server paths fill in `error` but leave the flag set, so both
    /// count.
    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }

    /// Splits the reply into its outcome.
    pub fn into_reply(mut self) -> Reply<Self> {
        if self.is_success() {
            Reply::Accepted(self)
        } else {
            Reply::Rejected(self.error.take().unwrap_or_else(ResponseError::unspecified))
        }
    }
}

impl WireMessage {
    /// Reads `data` as a generic [`LobbyResponse`], e.g. the answer to
    /// `LEAVE_GAME` or `DESTROY_GAME`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if `data` isn't a reply body.
    pub fn lobby_reply(&self) -> Result<Reply<LobbyResponse>, ProtocolError> {
        Ok(self.data_as::<LobbyResponse>()?.into_reply())
    }

    /// Reads `data` as the answer to a join (or create, which joins).
    ///
    /// Two shapes are accepted: `{gameId, username}` and the server's reply
    /// body, where the game travels as `code`. A body that reports failure
    /// is [`Reply::Rejected`] with the server's error.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] for data that isn't an object of either
    /// shape, [`ProtocolError::InvalidMessage`] for a success that names no
    /// game or no player.
    pub fn join_reply(&self) -> Result<Reply<GameJoined>, ProtocolError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            #[serde(rename = "sucess", alias = "success")]
            success: Option<bool>,
            game_id: Option<GameId>,
            code: Option<String>,
            username: Option<String>,
            error: Option<ResponseError>,
        }

        let body: Body = self.data_as()?;
        if body.success == Some(false) || body.error.is_some() {
            return Ok(Reply::Rejected(
                body.error.unwrap_or_else(ResponseError::unspecified),
            ));
        }

        let game_id = body
            .game_id
            .or_else(|| body.code.map(GameId::from))
            .ok_or_else(|| ProtocolError::InvalidMessage("join reply names no game".into()))?;
        let username = body
            .username
            .ok_or_else(|| ProtocolError::InvalidMessage("join reply names no player".into()))?;
        Ok(Reply::Accepted(GameJoined { game_id, username }))
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The lobby server parses exact JSON shapes, so most of these tests
    //! pin the serialized form rather than just round-tripping.

    use super::*;

    // =====================================================================
    // WireMessage
    // =====================================================================

    #[test]
    fn test_wire_message_embeds_data_as_text() {
        let msg = WireMessage::new("CREATE_GAME", r#"{"username":"bob"}"#);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "CREATE_GAME");
        // A string, not an object: the server parses it a second time.
        assert_eq!(json["data"], r#"{"username":"bob"}"#);
    }

    #[test]
    fn test_wire_message_accepts_inline_data() {
        let raw = r#"{"type":"JOIN_GAME","data":{"gameId":"abc123","username":"alice"}}"#;
        let msg: WireMessage = serde_json::from_str(raw).unwrap();

        assert_eq!(msg.msg_type, "JOIN_GAME");
        let joined: GameJoined = msg.data_as().unwrap();
        assert_eq!(joined.game_id, GameId::from("abc123"));
        assert_eq!(joined.username, "alice");
    }

    #[test]
    fn test_wire_message_missing_data_is_null() {
        let msg: WireMessage = serde_json::from_str(r#"{"type":"STOP_GAME"}"#).unwrap();
        assert_eq!(msg.data, "null");

        let msg: WireMessage =
            serde_json::from_str(r#"{"type":"STOP_GAME","data":null}"#).unwrap();
        assert_eq!(msg.data, "null");
    }

    #[test]
    fn test_wire_message_validate_rejects_empty_type() {
        let msg: WireMessage = serde_json::from_str(r#"{"data":"{}"}"#).unwrap();
        assert!(matches!(
            msg.validate(),
            Err(ProtocolError::InvalidMessage(_))
        ));
        assert!(WireMessage::new("JOIN_GAME", "{}").validate().is_ok());
    }

    #[test]
    fn test_data_as_wrong_shape_is_decode_error() {
        let msg = WireMessage::new("JOIN_GAME", r#"{"nope":1}"#);
        let result: Result<GameJoined, _> = msg.data_as();
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    // =====================================================================
    // Intents
    // =====================================================================

    #[test]
    fn test_create_game_intent() {
        let intent = OutboundIntent::from_payload(&CreateGame {
            username: "bob".into(),
        })
        .unwrap();

        assert_eq!(intent.msg_type, "CREATE_GAME");
        assert_eq!(intent.data, r#"{"username":"bob"}"#);
    }

    #[test]
    fn test_join_game_uses_camel_case_game_id() {
        let intent = OutboundIntent::from_payload(&JoinGame {
            game_id: "abc123".into(),
            username: "alice".into(),
        })
        .unwrap();

        assert_eq!(intent.msg_type, "JOIN_GAME");
        assert_eq!(intent.data, r#"{"gameId":"abc123","username":"alice"}"#);
    }

    #[test]
    fn test_fieldless_intents_send_empty_objects() {
        // The server only dispatches when `data` parses to an object.
        let intent = OutboundIntent::from_payload(&LeaveGame {}).unwrap();
        assert_eq!(intent.msg_type, "LEAVE_GAME");
        assert_eq!(intent.data, "{}");

        assert_eq!(
            OutboundIntent::from_payload(&StartGame {}).unwrap().msg_type,
            "START_GAME"
        );
    }

    // =====================================================================
    // Replies
    // =====================================================================

    #[test]
    fn test_lobby_response_reads_server_spelling() {
        let raw = r#"{"sucess":false,"code":"qwerty","username":"bob",
            "error":{"code":"GAME_NOT_FOUND_ERROR","description":"Game 'qwerty' was not found."}}"#;
        let resp: LobbyResponse = serde_json::from_str(raw).unwrap();

        assert!(!resp.success);
        assert_eq!(resp.code.as_deref(), Some("qwerty"));
        let err = resp.error.unwrap();
        assert_eq!(err.code, ErrorCode::GameNotFound);
        assert!(err.description.unwrap().contains("qwerty"));
    }

    #[test]
    fn test_lobby_response_accepts_correct_spelling() {
        let resp: LobbyResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(resp.success);
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_join_reply_accepts_both_shapes() {
        let msg = WireMessage::new("JOIN_GAME", r#"{"gameId":"abc123","username":"alice"}"#);
        assert_eq!(
            msg.join_reply().unwrap(),
            Reply::Accepted(GameJoined {
                game_id: "abc123".into(),
                username: "alice".into(),
            })
        );

        let msg = WireMessage::new("JOIN_GAME", r#"{"sucess":true,"code":"qwerty","username":"bob"}"#);
        assert_eq!(
            msg.join_reply().unwrap(),
            Reply::Accepted(GameJoined {
                game_id: "qwerty".into(),
                username: "bob".into(),
            })
        );
    }

    #[test]
    fn test_join_reply_failure_keeps_error_code() {
        let msg = WireMessage::new(
            "JOIN_GAME",
            r#"{"sucess":false,"code":"nope","username":"bob",
                "error":{"code":"GAME_NOT_FOUND_ERROR","description":"Game 'nope' was not found."}}"#,
        );
        let Reply::Rejected(error) = msg.join_reply().unwrap() else {
            panic!("expected a rejection");
        };
        assert_eq!(error.code, ErrorCode::GameNotFound);

        let msg = WireMessage::new("JOIN_GAME", r#"{"sucess":false}"#);
        assert_eq!(
            msg.join_reply().unwrap(),
            Reply::Rejected(ResponseError::unspecified())
        );
    }

    #[test]
    fn test_join_reply_without_game_is_invalid() {
        let msg = WireMessage::new("JOIN_GAME", r#"{"username":"bob"}"#);
        assert!(matches!(
            msg.join_reply(),
            Err(ProtocolError::InvalidMessage(_))
        ));
        let msg = WireMessage::new("JOIN_GAME", "null");
        assert!(matches!(msg.join_reply(), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_lobby_reply_error_overrides_flag() {
        let msg = WireMessage::new("LEAVE_GAME", r#"{"sucess":true,"code":"qwerty","username":"bob"}"#);
        assert!(matches!(msg.lobby_reply().unwrap(), Reply::Accepted(_)));

        // Destroying an already-removed game reports an error with the flag still set.
        let msg = WireMessage::new(
            "DESTROY_GAME",
            r#"{"sucess":true,"error":{"code":"GAME_NOT_FOUND_ERROR"}}"#,
        );
        let Reply::Rejected(error) = msg.lobby_reply().unwrap() else {
            panic!("expected a rejection");
        };
        assert_eq!(error.code, ErrorCode::GameNotFound);
        assert!(error.description.is_none());
    }

    #[test]
    fn test_error_code_known_and_unknown() {
        let code: ErrorCode = serde_json::from_str(r#""GAME_IN_PROGRESS""#).unwrap();
        assert_eq!(code, ErrorCode::GameInProgress);

        let code: ErrorCode = serde_json::from_str(r#""SERVER_ON_FIRE""#).unwrap();
        assert_eq!(code, ErrorCode::Unknown("SERVER_ON_FIRE".into()));
        assert_eq!(serde_json::to_string(&code).unwrap(), r#""SERVER_ON_FIRE""#);
    }

    #[test]
    fn test_error_code_display_matches_wire() {
        assert_eq!(ErrorCode::PlayerExists.to_string(), "PLAYER_EXISTS_ERROR");
    }

    #[test]
    fn test_game_id_is_plain_string() {
        assert_eq!(serde_json::to_string(&GameId::from("abc")).unwrap(), r#""abc""#);
        assert!(GameId::default().is_empty());
    }
}

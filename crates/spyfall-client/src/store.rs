//! Root state container for the UI, driven by a reducer.
//!
//! The UI never mutates [`RootState`] directly. It dispatches an
//! [`Action`], and [`reduce`] computes the next state. [`bind_store`]
//! connects a store to a client so server replies arrive as actions.

use std::sync::{Arc, PoisonError, RwLock};

use spyfall_protocol::{
    Codec, GameId, ProtocolError, Reply, ResponseError, WireMessage, message_type,
};
use spyfall_transport::Connector;
use tokio::sync::broadcast;

use crate::{ClientEvent, LobbyClient};

/// What the UI knows about the lobby.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootState {
    /// The game this client is in, if any.
    pub game_id: Option<GameId>,
    /// Players known to be in that game, in join order.
    pub players: Vec<String>,
}

/// Everything that can change [`RootState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `username` is now in `game_id`.
    GameJoined { game_id: GameId, username: String },
    /// We left, or the game was destroyed.
    GameLeft,
}

/// Computes the state after `action`. Pure; never fails.
pub fn reduce(state: &RootState, action: Action) -> RootState {
    match action {
        Action::GameJoined { game_id, username } => {
            // Moving to another game starts a fresh roster.
            let mut players = if state.game_id.as_ref() == Some(&game_id) {
                state.players.clone()
            } else {
                Vec::new()
            };
            if !players.contains(&username) {
                players.push(username);
            }
            RootState {
                game_id: Some(game_id),
                players,
            }
        }
        Action::GameLeft => RootState::default(),
    }
}

/// Shared, lock-protected [`RootState`].
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<RootState>,
}

impl Store {
    /// Creates a store holding the initial (empty) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `action` through [`reduce`].
    pub fn dispatch(&self, action: Action) {
        tracing::debug!(?action, "store dispatch");
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = reduce(&state, action);
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> RootState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Feeds the server's lobby replies from `client` into `store`.
///
/// - `JOIN_GAME` (also the answer to `CREATE_GAME`): a join records the
///   game and player.
/// - `LEAVE_GAME` and `DESTROY_GAME`: success clears the game.
///
/// A refusal leaves the state alone and is published as
/// [`ClientEvent::Rejected`] with the server's error code. A reply that
/// can't be read is published as [`ClientEvent::ProtocolError`].
pub fn bind_store<C: Connector, K: Codec>(client: &LobbyClient<C, K>, store: Arc<Store>) {
    let events = client.event_sender();

    {
        let store = Arc::clone(&store);
        let events = events.clone();
        client.subscribe(message_type::JOIN_GAME, move |message: &WireMessage| {
            match message.join_reply() {
                Ok(Reply::Accepted(joined)) => store.dispatch(Action::GameJoined {
                    game_id: joined.game_id,
                    username: joined.username,
                }),
                Ok(Reply::Rejected(error)) => rejected(&events, message, error),
                Err(e) => unreadable(&events, message, e),
            }
        });
    }

    for msg_type in [message_type::LEAVE_GAME, message_type::DESTROY_GAME] {
        let store = Arc::clone(&store);
        let events = events.clone();
        client.subscribe(msg_type, move |message: &WireMessage| {
            match message.lobby_reply() {
                Ok(Reply::Accepted(_)) => store.dispatch(Action::GameLeft),
                Ok(Reply::Rejected(error)) => rejected(&events, message, error),
                Err(e) => unreadable(&events, message, e),
            }
        });
    }
}

fn rejected(events: &broadcast::Sender<ClientEvent>, message: &WireMessage, error: ResponseError) {
    tracing::warn!(
        msg_type = %message.msg_type,
        code = %error.code,
        description = error.description.as_deref().unwrap_or(""),
        "request rejected by server"
    );
    let _ = events.send(ClientEvent::Rejected {
        msg_type: message.msg_type.clone(),
        error,
    });
}

fn unreadable(events: &broadcast::Sender<ClientEvent>, message: &WireMessage, e: ProtocolError) {
    tracing::warn!(msg_type = %message.msg_type, error = %e, "reply did not decode");
    let _ = events.send(ClientEvent::ProtocolError(e.to_string()));
}

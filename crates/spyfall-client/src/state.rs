//! Connection lifecycle state machine.

use std::fmt;

/// Where the client's single connection is in its lifecycle.
///
/// ```text
///            open()            connected
///   Idle ───────────→ Connecting ─────────→ Open
///                      │    ▲                │
///        connect failed│    │open()          │close() / remote close /
///                      ▼    │                │transport error
///                      Closed ◀──────────────┘
/// ```
///
/// - **Idle**: nothing attempted yet.
/// - **Connecting**: a connect is in flight. Sends are refused.
/// - **Open**: the only state in which anything is transmitted.
/// - **Closed**: the connection is gone. Calling `open` again reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Returns `true` if intents can be transmitted right now.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if moving to `target` is a valid transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Idle, Self::Connecting)
                | (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Closed)
                | (Self::Open, Self::Closed)
                | (Self::Closed, Self::Connecting)
        )
    }

    /// Moves to `target`, or hands back the rejected pair.
    ///
    /// # Errors
    /// Returns `(from, to)` when the transition isn't allowed; the client
    /// turns that into [`ClientError::InvalidTransition`](crate::ClientError).
    pub fn transition(&mut self, target: Self) -> Result<Self, (Self, Self)> {
        if !self.can_transition_to(target) {
            return Err((*self, target));
        }
        let from = *self;
        *self = target;
        Ok(from)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConnectionState; 4] = [
        ConnectionState::Idle,
        ConnectionState::Connecting,
        ConnectionState::Open,
        ConnectionState::Closed,
    ];

    #[test]
    fn test_default_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = ConnectionState::Idle;
        assert_eq!(state.transition(ConnectionState::Connecting), Ok(ConnectionState::Idle));
        assert_eq!(state.transition(ConnectionState::Open), Ok(ConnectionState::Connecting));
        assert_eq!(state.transition(ConnectionState::Closed), Ok(ConnectionState::Open));
        // Closed is reconnectable.
        assert_eq!(state.transition(ConnectionState::Connecting), Ok(ConnectionState::Closed));
        assert_eq!(state, ConnectionState::Connecting);
    }

    #[test]
    fn test_connect_failure_goes_to_closed() {
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Closed));
    }

    #[test]
    fn test_exactly_five_transitions_are_valid() {
        let valid = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .count();
        assert_eq!(valid, 5);
    }

    #[test]
    fn test_invalid_transition_leaves_state_untouched() {
        let mut state = ConnectionState::Idle;
        assert_eq!(
            state.transition(ConnectionState::Open),
            Err((ConnectionState::Idle, ConnectionState::Open))
        );
        assert_eq!(state, ConnectionState::Idle);

        let mut state = ConnectionState::Open;
        assert!(state.transition(ConnectionState::Connecting).is_err());
        assert!(state.transition(ConnectionState::Open).is_err());
        assert_eq!(state, ConnectionState::Open);
    }

    #[test]
    fn test_only_open_is_open() {
        for state in ALL {
            assert_eq!(state.is_open(), state == ConnectionState::Open);
        }
    }

    #[test]
    fn test_connect_only_from_idle_and_closed() {
        use ConnectionState::*;
        let connectable: Vec<_> = [Idle, Connecting, Open, Closed]
            .into_iter()
            .filter(|s| s.can_transition_to(Connecting))
            .collect();
        assert_eq!(connectable, vec![Idle, Closed]);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}

//! Publish/subscribe routing of inbound messages by type key.
//!
//! The broker is deliberately dumb: a map from type key to the listeners
//! registered under it. It never decodes anything; the client unpacks
//! frames and hands the broker finished [`WireMessage`]s.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use spyfall_protocol::WireMessage;

/// A callback invoked with every message routed to its key.
pub type Listener = Arc<dyn Fn(&WireMessage) + Send + Sync>;

/// Routes messages to listeners by [`WireMessage::msg_type`].
///
/// - Several listeners may share a key; they run in registration order.
/// - Registering the same callback twice means it runs twice.
/// - There is no unsubscribe. Listeners live as long as the broker.
#[derive(Default)]
pub struct MessageBroker {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
}

impl MessageBroker {
    /// Creates a broker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for messages tagged `msg_type`.
    pub fn subscribe<F>(&self, msg_type: impl Into<String>, listener: F)
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        let msg_type = msg_type.into();
        tracing::debug!(msg_type, "listener subscribed");
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(msg_type)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Invokes every listener registered for `message.msg_type`, in order,
    /// and returns how many ran. Unknown keys are not an error: nothing
    /// runs and the result is `0`.
    ///
    /// The listener list is cloned out before any callback runs, so a
    /// listener may subscribe further listeners (they take effect from
    /// the next message on).
    pub fn dispatch(&self, message: &WireMessage) -> usize {
        let listeners: Vec<Listener> = {
            let map = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            match map.get(&message.msg_type) {
                Some(list) => list.clone(),
                None => {
                    tracing::debug!(msg_type = %message.msg_type, "no listeners, dropping message");
                    return 0;
                }
            }
        };

        for listener in &listeners {
            listener(message);
        }
        listeners.len()
    }

    /// Number of listeners registered under `msg_type`.
    pub fn listener_count(&self, msg_type: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(msg_type)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for MessageBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        keys.sort_unstable();
        f.debug_struct("MessageBroker").field("listeners", &keys).finish()
    }
}

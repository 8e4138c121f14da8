//! In-process transport built on Tokio channels.
//!
//! [`MemoryConnector::pair`] returns a connector and a listener. Every
//! `connect` call parks until the listener [`accept`](MemoryListener::accept)s
//! it, which makes it easy to observe the client while a connection attempt
//! is still in flight.
//!
//! ```text
//! client ── MemoryConnection ══ mpsc ══ MemoryPeer ── test / fake server
//! ```

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::{Connection, ConnectionId, Connector, TransportError};

/// A connection request waiting for the listener.
struct PendingConnect {
    url: String,
    peer: MemoryPeer,
    accepted: oneshot::Sender<()>,
}

/// Client side of the in-process transport.
#[derive(Clone)]
pub struct MemoryConnector {
    requests: mpsc::UnboundedSender<PendingConnect>,
}

impl MemoryConnector {
    /// Creates a connected connector/listener pair.
    pub fn pair() -> (MemoryConnector, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MemoryConnector { requests: tx }, MemoryListener { requests: rx })
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, url: &str) -> Result<Self::Connection, TransportError> {
        let (to_peer, from_client) = mpsc::unbounded_channel();
        let (to_client, from_peer) = mpsc::unbounded_channel();
        let (accepted_tx, accepted_rx) = oneshot::channel();

        let id = ConnectionId::next();
        let pending = PendingConnect {
            url: url.to_string(),
            peer: MemoryPeer {
                id,
                url: url.to_string(),
                outbound: Some(to_client),
                inbound: from_client,
            },
            accepted: accepted_tx,
        };

        self.requests.send(pending).map_err(|_| {
            TransportError::connect_failed(
                url,
                std::io::ErrorKind::ConnectionRefused,
                "memory listener dropped",
            )
        })?;

        // The listener dropping the request (or itself) means "refused".
        accepted_rx.await.map_err(|_| {
            TransportError::connect_failed(
                url,
                std::io::ErrorKind::ConnectionRefused,
                "connection refused by memory listener",
            )
        })?;

        tracing::debug!(%id, url, "memory connection established");

        Ok(MemoryConnection {
            id,
            outbound: Mutex::new(Some(to_peer)),
            inbound: Mutex::new(from_peer),
        })
    }
}

/// Server side of the in-process transport: accepts pending connects.
pub struct MemoryListener {
    requests: mpsc::UnboundedReceiver<PendingConnect>,
}

impl MemoryListener {
    /// Waits for the next connect call and completes it.
    ///
    /// Returns `None` once every [`MemoryConnector`] clone has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        loop {
            let pending = self.requests.recv().await?;
            // The connecting side may have given up; skip it.
            if pending.accepted.send(()).is_ok() {
                return Some(pending.peer);
            }
        }
    }

    /// Takes the next connect call and refuses it.
    ///
    /// Returns the URL that was refused, or `None` if no connector remains.
    pub async fn refuse(&mut self) -> Option<String> {
        let pending = self.requests.recv().await?;
        Some(pending.url)
    }
}

/// The client's end of an in-process connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let tx = outbound
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionClosed("closed locally".into()))?;
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping our sender is how the peer learns we hung up.
        self.outbound.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The far end of an in-process connection, used by tests to play server.
pub struct MemoryPeer {
    id: ConnectionId,
    url: String,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// The id shared with the client's [`MemoryConnection`].
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The URL the client asked to connect to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pushes a frame to the client.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the client is gone
    /// or this peer already hung up.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| TransportError::ConnectionClosed("peer closed".into()))?;
        tx.send(data.into())
            .map_err(|_| TransportError::ConnectionClosed("client dropped".into()))
    }

    /// Waits for the next frame from the client. `None` once the client
    /// closed or dropped its connection.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// Returns a frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.inbound.try_recv().ok()
    }

    /// Hangs up; the client's next `recv` returns `Ok(None)`.
    pub fn close(&mut self) {
        self.outbound.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_waits_for_accept() {
        let (connector, mut listener) = MemoryConnector::pair();

        let connecting = tokio::spawn(async move { connector.connect("mem://lobby").await });
        tokio::task::yield_now().await;
        assert!(!connecting.is_finished());

        let peer = listener.accept().await.expect("pending connect");
        assert_eq!(peer.url(), "mem://lobby");

        let conn = connecting.await.unwrap().expect("should connect");
        assert_eq!(conn.id(), peer.id());
    }

    #[tokio::test]
    async fn test_refused_connect_is_an_error() {
        let (connector, mut listener) = MemoryConnector::pair();

        let connecting = tokio::spawn(async move { connector.connect("mem://nope").await });
        assert_eq!(listener.refuse().await.as_deref(), Some("mem://nope"));

        let result = connecting.await.unwrap();
        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut listener) = MemoryConnector::pair();
        let connecting = tokio::spawn(async move { connector.connect("mem://x").await });
        let mut peer = listener.accept().await.unwrap();
        let conn = connecting.await.unwrap().unwrap();

        conn.send(b"ping").await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some(&b"ping"[..]));

        peer.send(b"pong".to_vec()).unwrap();
        assert_eq!(conn.recv().await.unwrap().as_deref(), Some(&b"pong"[..]));
    }

    #[tokio::test]
    async fn test_close_is_seen_by_both_sides() {
        let (connector, mut listener) = MemoryConnector::pair();
        let connecting = tokio::spawn(async move { connector.connect("mem://x").await });
        let mut peer = listener.accept().await.unwrap();
        let conn = connecting.await.unwrap().unwrap();

        conn.close().await.unwrap();
        assert!(peer.recv().await.is_none());
        assert!(matches!(
            conn.send(b"late").await,
            Err(TransportError::ConnectionClosed(_))
        ));

        peer.close();
        assert!(conn.recv().await.unwrap().is_none());
    }
}

//! In-process connection pair.
//!
//! [`MemoryConnection`] is the server-side handle; [`MemoryPeer`] plays
//! the client. Frames written on one side are read on the other through
//! unbounded channels. Dropping the peer (or calling
//! [`MemoryPeer::close`]) makes every later send on the connection fail,
//! which is exactly what a dead socket looks like to the coordinator.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, TransportError};

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: AtomicBool,
}

/// Client side of an in-memory connection.
pub struct MemoryPeer {
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    inbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl MemoryConnection {
    /// Creates a connected pair.
    pub fn pair() -> (Self, MemoryPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = Self {
            id: ConnectionId::next(),
            outbound: out_tx,
            inbound: Mutex::new(in_rx),
            closed: AtomicBool::new(false),
        };
        let peer = MemoryPeer {
            outbound: out_rx,
            inbound: in_tx,
        };
        (conn, peer)
    }

    /// Whether [`close`](Connection::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(format!(
                "{} closed locally",
                self.id
            )));
        }
        self.outbound.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed(format!("{} peer gone", self.id))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.is_closed() {
            return Ok(None);
        }
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl MemoryPeer {
    /// Waits for the next frame the server sent. `None` once the server
    /// side has been dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    /// Returns a buffered frame without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }

    /// Delivers a frame to the server side's `recv`.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.inbound.send(data.into()).map_err(|_| {
            TransportError::ConnectionClosed("server side dropped".into())
        })
    }

    /// Hangs up. Sends on the server side fail from now on and its
    /// `recv` returns `None`.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (conn, mut peer) = MemoryConnection::pair();

        conn.send(b"hello").await.expect("send");
        assert_eq!(peer.recv().await, Some(b"hello".to_vec()));

        peer.send("pick").expect("peer send");
        let got = conn.recv().await.expect("recv");
        assert_eq!(got, Some(b"pick".to_vec()));
    }

    #[tokio::test]
    async fn test_send_fails_after_peer_hangs_up() {
        let (conn, peer) = MemoryConnection::pair();
        peer.close();

        let err = conn.send(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
        assert_eq!(conn.recv().await.expect("recv"), None);
    }

    #[tokio::test]
    async fn test_send_fails_after_local_close() {
        let (conn, mut peer) = MemoryConnection::pair();
        conn.close().await.expect("close");

        assert!(conn.is_closed());
        assert!(conn.send(b"x").await.is_err());
        assert!(peer.try_recv().is_none());
    }

    #[test]
    fn test_pairs_get_distinct_ids() {
        let (a, _pa) = MemoryConnection::pair();
        let (b, _pb) = MemoryConnection::pair();
        assert_ne!(a.id(), b.id());
    }
}

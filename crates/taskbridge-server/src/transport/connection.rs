//! One client stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use taskbridge_core::{ClientId, ConnectionId};
use tokio::sync::mpsc;

/// Which wire format a stream speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Duplex socket envelope (`/ws`).
    Socket,
    /// Streaming RPC frames (`/control`).
    Control,
}

impl Flavor {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Socket => "socket",
            Self::Control => "control",
        }
    }
}

/// Outbound half of one client stream.
///
/// Frames are queued on a bounded channel drained by the stream's writer
/// task. Enqueueing never waits: a full or closed queue counts a drop.
pub struct ClientConnection {
    /// Stream id.
    pub id: ConnectionId,
    /// Owning client.
    pub client_id: ClientId,
    /// Wire format.
    pub flavor: Flavor,
    tx: mpsc::Sender<Arc<String>>,
    connected_at: Instant,
    alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped: AtomicU64,
}

impl ClientConnection {
    /// Wrap the sending side of a stream's outbound queue.
    pub fn new(client_id: ClientId, flavor: Flavor, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            client_id,
            flavor,
            tx,
            connected_at: now,
            alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a rendered frame. `false` (and a counted drop) when the queue
    /// is full or the writer is gone.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Frames dropped so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Returns whether there was activity since the previous check, and resets it.
    pub fn check_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Stream age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("flavor", &self.flavor)
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(ClientId::from("c1"), Flavor::Socket, tx), rx)
    }

    #[tokio::test]
    async fn send_delivers() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn full_queue_counts_drop() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("a".into())));
        assert!(!conn.send(Arc::new("b".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_queue_counts_drop() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(conn.is_closed());
        assert!(!conn.send(Arc::new("a".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn alive_flag_resets_on_check() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
        assert!(conn.last_pong_elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn connections_get_distinct_ids() {
        let (a, _ra) = make_connection(1);
        let (b, _rb) = make_connection(1);
        assert_ne!(a.id, b.id);
        assert_eq!(Flavor::Control.as_str(), "control");
    }
}

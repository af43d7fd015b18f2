//! Registry of connected clients and the broadcast fan-out.
//!
//! All mutations and the fan-out pass share one async mutex, so a broadcast
//! observes a consistent set of clients: nobody is visited twice and nobody
//! is visited after a concurrent removal.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// Default upper bound for writing one frame to one client
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

const CLOSE_TIMEOUT: Duration = Duration::from_millis(200);

/// Identifier assigned to a connection when it is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The server-to-client half of an accepted connection
pub struct ClientConnection {
    peer: String,
    writer: BoxedWriter,
    closed: CancellationToken,
}

impl ClientConnection {
    pub fn new(peer: impl Into<String>, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            peer: peer.into(),
            writer: Box::new(writer),
            closed: CancellationToken::new(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Token cancelled once the registry has closed this connection.
    ///
    /// The task holding the read half waits on it to release the socket.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn send(&mut self, frame: &[u8], send_timeout: Duration) -> std::io::Result<()> {
        let write = async {
            self.writer.write_all(frame).await?;
            self.writer.flush().await
        };
        match timeout(send_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("send timed out after {:?}", send_timeout),
            )),
        }
    }

    async fn close(mut self) {
        // The peer may already be gone; shutting down is best effort.
        let _ = timeout(CLOSE_TIMEOUT, self.writer.shutdown()).await;
        self.closed.cancel();
    }
}

struct RegisteredClient {
    id: ClientId,
    connection: ClientConnection,
}

/// Outcome of one fan-out pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that received the frame, in registry order
    pub delivered: Vec<ClientId>,
    /// Clients whose send failed and that were removed
    pub dropped: Vec<ClientId>,
}

/// Thread-safe, ordered set of live client connections
pub struct ClientRegistry {
    clients: Mutex<Vec<RegisteredClient>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::with_send_timeout(DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Register a connection; it becomes a target of every later broadcast
    pub async fn add(&self, connection: ClientConnection) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut clients = self.clients.lock().await;
        tracing::debug!("Client {} ({}) registered", id, connection.peer());
        clients.push(RegisteredClient { id, connection });
        id
    }

    /// Remove and close a connection.
    ///
    /// Removing an id that is not registered is a no-op and returns `false`.
    pub async fn remove(&self, id: ClientId) -> bool {
        let removed = {
            let mut clients = self.clients.lock().await;
            clients
                .iter()
                .position(|client| client.id == id)
                .map(|index| clients.remove(index))
        };
        match removed {
            Some(client) => {
                tracing::debug!(
                    "Client {} ({}) unregistered",
                    client.id,
                    client.connection.peer()
                );
                client.connection.close().await;
                true
            }
            None => false,
        }
    }

    /// Write `frame` to every registered client.
    ///
    /// Each client gets one complete write bounded by the send timeout. A
    /// client whose write fails or times out is removed and closed before
    /// the lock is released; the remaining clients are unaffected.
    pub async fn broadcast(&self, frame: &[u8]) -> BroadcastReport {
        let mut clients = self.clients.lock().await;
        let mut report = BroadcastReport::default();

        for client in clients.iter_mut() {
            match client.connection.send(frame, self.send_timeout).await {
                Ok(()) => report.delivered.push(client.id),
                Err(e) => {
                    tracing::warn!(
                        "Failed to send to client {} ({}): {}",
                        client.id,
                        client.connection.peer(),
                        e
                    );
                    report.dropped.push(client.id);
                }
            }
        }

        if !report.dropped.is_empty() {
            let (failed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *clients)
                .into_iter()
                .partition(|client| report.dropped.contains(&client.id));
            *clients = kept;
            for client in failed {
                tracing::info!(
                    "Removed disconnected client {} ({})",
                    client.id,
                    client.connection.peer()
                );
                client.connection.close().await;
            }
        }

        report
    }

    /// Close every connection and empty the registry. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let mut clients = self.clients.lock().await;
        let count = clients.len();
        for client in clients.drain(..) {
            client.connection.close().await;
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Registered ids in broadcast order
    pub async fn ids(&self) -> Vec<ClientId> {
        self.clients
            .lock()
            .await
            .iter()
            .map(|client| client.id)
            .collect()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

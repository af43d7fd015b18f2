//! Broadcast server: accept loop, per-connection holders and the fixed-tick
//! fan-out of the latest joystick snapshot.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use joybridge_shared::encode_frame;
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    time::{MissedTickBehavior, timeout},
};
use tokio_util::sync::CancellationToken;

use crate::{
    device::{DeviceCommand, DeviceReader},
    error::{DeviceError, ServerError},
    queue::SnapshotSlot,
    registry::{ClientConnection, ClientRegistry, DEFAULT_SEND_TIMEOUT},
};

/// Default broadcast cadence
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

const DEVICE_STOP_TIMEOUT: Duration = Duration::from_secs(2);
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Server configuration, built from the command line
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub device: DeviceCommand,
    pub tick: Duration,
    pub send_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9999,
            device: DeviceCommand::default(),
            tick: DEFAULT_TICK,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Joystick broadcast server
///
/// # Example
///
/// ```ignore
/// let server = BroadcastServer::listen(ServerConfig::default()).await?;
/// server.run(shutdown_signal()).await?;
/// ```
pub struct BroadcastServer {
    listener: TcpListener,
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    slot: Arc<SnapshotSlot>,
    cancel: CancellationToken,
}

impl BroadcastServer {
    /// Bind the listening socket on `config.host:config.port`
    pub async fn listen(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(
            "Joystick server listening on {}, waiting for clients...",
            listener.local_addr()?
        );

        Ok(Self {
            listener,
            registry: Arc::new(ClientRegistry::with_send_timeout(config.send_timeout)),
            slot: Arc::new(SnapshotSlot::new()),
            cancel: CancellationToken::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        self.registry.clone()
    }

    pub fn slot(&self) -> Arc<SnapshotSlot> {
        self.slot.clone()
    }

    /// Token cancelled when the server begins shutting down
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start the device reader and serve until `shutdown` resolves or the
    /// device stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Device`] if the device reader fails. Connected
    /// clients are closed before returning in every case.
    pub async fn run<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        let reader = DeviceReader::new(self.config.device.clone(), self.slot.clone());
        let device = reader.run(self.cancel.child_token());
        self.serve(device, shutdown).await
    }

    /// Serve with an arbitrary snapshot producer in place of the subprocess.
    ///
    /// `device` should stop once the server's cancellation fires; it is
    /// aborted if it does not stop in time.
    pub async fn serve<D, S>(self, device: D, shutdown: S) -> Result<(), ServerError>
    where
        D: Future<Output = Result<(), DeviceError>> + Send + 'static,
        S: Future<Output = ()>,
    {
        let Self {
            listener,
            config,
            registry,
            slot,
            cancel,
        } = self;

        let accept_task = tokio::spawn(accept_loop(listener, registry.clone(), cancel.clone()));
        let mut device_task = tokio::spawn(device);
        let mut device_finished = false;

        let mut ticker = tokio::time::interval(config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Server shutting down...");
                    break Ok(());
                }
                result = &mut device_task => {
                    device_finished = true;
                    let error = match result {
                        Ok(Ok(())) => DeviceError::StreamEnded,
                        Ok(Err(e)) => e,
                        Err(e) => DeviceError::Task(e.to_string()),
                    };
                    tracing::error!("{}; no more snapshots can be produced", error);
                    break Err(ServerError::Device(error));
                }
                _ = ticker.tick() => {
                    broadcast_pending(&slot, &registry).await;
                }
            }
        };

        cancel.cancel();
        if !device_finished && timeout(DEVICE_STOP_TIMEOUT, &mut device_task).await.is_err() {
            tracing::warn!("Device reader did not stop in time, aborting");
            device_task.abort();
        }
        if let Err(e) = accept_task.await {
            tracing::warn!("Accept loop ended abnormally: {}", e);
        }
        let closed = registry.close_all().await;
        tracing::info!("Closed {} client connection(s)", closed);
        tracing::info!("Server shutdown complete");

        outcome
    }
}

/// Take the pending snapshot, if any, and send it to every client
pub async fn broadcast_pending(slot: &SnapshotSlot, registry: &ClientRegistry) {
    let Some(snapshot) = slot.take() else {
        return;
    };
    if registry.is_empty().await {
        tracing::trace!("No clients connected, dropping snapshot");
        return;
    }
    let frame = match encode_frame(&snapshot) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("Failed to encode snapshot: {}", e);
            return;
        }
    };
    let report = registry.broadcast(&frame).await;
    tracing::debug!(
        "Broadcast snapshot to {} client(s), dropped {}",
        report.delivered.len(),
        report.dropped.len()
    );
}

/// Accept connections until `cancel` fires, spawning one holder per client
pub async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tokio::spawn(hold_client(stream, addr, registry.clone(), cancel.clone()));
                }
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
    tracing::debug!("Accept loop stopped");
}

/// Register a connection and keep it open until the peer disconnects, the
/// registry drops it, or the server shuts down.
///
/// The protocol is server-to-client only; anything the peer sends is read
/// and discarded so that disconnects are noticed promptly.
async fn hold_client(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    cancel: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
    }
    let (mut reader, writer) = stream.into_split();
    let connection = ClientConnection::new(addr.to_string(), writer);
    let closed = connection.closed_token();
    let id = registry.add(connection).await;
    tracing::info!("Client connected: {} ({})", addr, id);

    let mut buf = [0u8; 256];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = closed.cancelled() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => tracing::trace!("Ignoring {} bytes from {}", n, addr),
                Err(e) => {
                    tracing::debug!("Read error from {}: {}", addr, e);
                    break;
                }
            }
        }
    }

    registry.remove(id).await;
    tracing::info!("Client {} ({}) disconnected", addr, id);
}

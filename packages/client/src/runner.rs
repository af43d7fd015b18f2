//! Client execution logic with reconnection support.

use tokio_util::sync::CancellationToken;

use crate::{
    actuator::Actuators,
    config::ClientConfig,
    domain::{reconnect_delay, should_attempt_reconnect},
    error::ClientError,
    guard::FanResetGuard,
    session::{SessionEnd, run_client_session},
};

/// Run the control client until shutdown or until reconnection gives up.
///
/// The fan is handed back to automatic control exactly once before this
/// returns, whatever the outcome.
///
/// # Errors
///
/// Returns the error that ended the last session once
/// `config.max_reconnects` attempts are exhausted. A requested shutdown
/// returns `Ok(())`.
pub async fn run_client(
    config: ClientConfig,
    actuators: Actuators,
    cancel: CancellationToken,
) -> Result<(), ClientError> {
    let guard = FanResetGuard::new(actuators.fan.clone(), config.mapping.gpu);
    let result = reconnect_loop(&config, &actuators, &cancel).await;
    guard.release().await;
    result
}

async fn reconnect_loop(
    config: &ClientConfig,
    actuators: &Actuators,
    cancel: &CancellationToken,
) -> Result<(), ClientError> {
    let mut reconnect_count = 0;

    loop {
        tracing::info!(
            "Attempting to connect to {} (attempt {}/{})",
            config.server_addr(),
            reconnect_count + 1,
            config.max_reconnects + 1
        );

        let error = match run_client_session(config, actuators, cancel).await {
            Ok(SessionEnd::Cancelled) => {
                tracing::info!("Client shutting down...");
                return Ok(());
            }
            Ok(SessionEnd::ServerClosed) => ClientError::ConnectionLost,
            Err(e) => e,
        };

        if !should_attempt_reconnect(reconnect_count, config.max_reconnects) {
            if config.max_reconnects > 0 {
                tracing::error!(
                    "Failed to reconnect after {} attempts. Exiting.",
                    config.max_reconnects
                );
            }
            return Err(error);
        }

        tracing::warn!("Connection lost: {}", error);
        reconnect_count += 1;
        let delay = reconnect_delay(reconnect_count);
        tracing::info!(
            "Reconnecting in {:?}... (attempt {}/{})",
            delay,
            reconnect_count + 1,
            config.max_reconnects + 1
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Client shutting down...");
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

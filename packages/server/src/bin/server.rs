//! Joystick broadcast server.
//!
//! Runs `jstest` against the joystick device and broadcasts the decoded
//! axes/buttons to every connected client as newline-delimited JSON.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin joybridge-server
//! cargo run --bin joybridge-server -- --ip 127.0.0.1 --port 9999 --device /dev/input/js1
//! ```

use std::process::ExitCode;

use clap::Parser;

use joybridge_server::{BroadcastServer, DeviceCommand, ServerConfig};
use joybridge_shared::{logger::setup_logger, signal::shutdown_signal};

#[derive(Parser, Debug)]
#[command(name = "joybridge-server")]
#[command(about = "Joystick server for broadcasting control signals", long_about = None)]
struct Args {
    /// Host IP address to bind
    #[arg(long, default_value = "0.0.0.0")]
    ip: String,

    /// Port number to bind
    #[arg(short = 'p', long, default_value = "9999")]
    port: u16,

    /// Joystick device passed to jstest
    #[arg(short = 'd', long, default_value = "/dev/input/js0")]
    device: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let config = ServerConfig {
        host: args.ip,
        port: args.port,
        device: DeviceCommand::jstest(&args.device),
        ..ServerConfig::default()
    };

    let server = match BroadcastServer::listen(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    match server.run(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

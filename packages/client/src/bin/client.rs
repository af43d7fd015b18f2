//! Fan control client.
//!
//! Connects to the joystick server and maps one axis to the GPU fan speed
//! and one button to the desktop light/dark color scheme. The fan is returned
//! to automatic control when the client exits, including on Ctrl+C / SIGTERM.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin joybridge-client -- --ip 192.168.1.10 --canal 1 --gpu 0
//! sudo joybridge-client --desktop-uid 1000 --max-reconnects 5
//! ```

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use joybridge_client::{
    Actuators, ClientConfig, CommandRunner, ControlMapping, DesktopUserRunner, DirectRunner,
    GnomeColorScheme, NvidiaSettings, run_client,
};
use joybridge_shared::{logger::setup_logger, signal::shutdown_signal};

#[derive(Parser, Debug)]
#[command(name = "joybridge-client")]
#[command(about = "Fan control client for the joystick server", long_about = None)]
struct Args {
    /// Server IP address
    #[arg(long, default_value = "localhost")]
    ip: String,

    /// Server port
    #[arg(short = 'p', long, default_value = "9999")]
    port: u16,

    /// Joystick axis mapped to the fan speed
    #[arg(long, default_value = "0")]
    canal: u32,

    /// GPU (and fan) index for nvidia-settings
    #[arg(long, default_value = "0")]
    gpu: u32,

    /// Joystick button toggling dark mode
    #[arg(long, default_value = "32")]
    button: u32,

    /// Run the color-scheme command as this user id (when running as root)
    #[arg(long)]
    desktop_uid: Option<u32>,

    /// Group id for the color-scheme command (defaults to the user id)
    #[arg(long, requires = "desktop_uid")]
    desktop_gid: Option<u32>,

    /// Reconnection attempts before giving up
    #[arg(long, default_value = "0")]
    max_reconnects: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let desktop_runner: Arc<dyn CommandRunner> = match args.desktop_uid {
        Some(uid) => Arc::new(DesktopUserRunner::new(uid, args.desktop_gid.unwrap_or(uid))),
        None => Arc::new(DirectRunner::new()),
    };
    let actuators = Actuators::new(
        Arc::new(NvidiaSettings::new(Arc::new(DirectRunner::new()))),
        Arc::new(GnomeColorScheme::new(desktop_runner)),
    );
    let config = ClientConfig {
        host: args.ip,
        port: args.port,
        mapping: ControlMapping {
            axis: args.canal,
            button: args.button,
            gpu: args.gpu,
        },
        max_reconnects: args.max_reconnects,
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    match run_client(config, actuators, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Client error: {}", e);
            ExitCode::FAILURE
        }
    }
}

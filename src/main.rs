//! Signaling relay binary.
//!
//! Usage:
//! ```bash
//! signal-relay --bind 0.0.0.0:8765
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;

use signal_relay::RelayServer;

#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(about = "Signaling relay for peer-to-peer media sessions")]
#[command(version)]
struct Args {
    /// Address to bind the relay listener
    #[arg(short, long, default_value = "0.0.0.0:8765")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    log::info!("Starting signaling relay on {}", args.bind);

    let server = RelayServer::bind(args.bind).await?;

    tokio::select! {
        result = server.run() => result,
        _ = shutdown_signal() => {
            log::info!("Termination signal received, shutting down");
            Ok(())
        }
    }
}

/// Completes on SIGINT or SIGTERM. Open connections are severed abruptly
/// on shutdown; the relay holds no durable state.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! huddle-relay binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use huddle_common::ConfigError;
use huddle_config::HuddleConfig;
use huddle_relay::{serve, RelaySettings, RoomStore};

#[derive(Parser)]
#[command(name = "huddle-relay", about = "WebSocket signaling relay for huddle calls")]
struct Args {
    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface to bind (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Config file; defaults to the platform config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load(args: &Args) -> Result<HuddleConfig, ConfigError> {
    let config = match &args.config {
        Some(path) => huddle_config::load_from_path(path)?,
        None => huddle_config::load_default()?,
    };
    huddle_config::validation::validate(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("huddle-relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.directive("huddle_relay").into()),
        )
        .init();

    let bind = args.bind.unwrap_or(config.relay.bind.clone());
    let port = args.port.unwrap_or(config.relay.port);
    let addr = format!("{bind}:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind TCP listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("huddle-relay listening on {}", addr);
    serve(listener, RoomStore::new(), RelaySettings::from_config(&config.relay)).await;
    ExitCode::SUCCESS
}

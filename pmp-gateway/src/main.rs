//! Predictive maintenance gateway
//!
//! Polls IO-Link sensors (real or simulated) on per-class timers and
//! republishes typed JSON readings to the cloud over MQTT, with optional
//! bounded dump-to-file:
//! - One-shot handshake to the device shadow, then steady-state polling
//! - Environmental / time-domain / frequency-domain signal classes
//! - Quota-bounded sample dumping with clean exit on completion

mod config;
mod device;
mod dump;
mod error;
mod payload;
mod publish;
mod scheduler;
mod session;
mod topics;

use clap::error::ErrorKind;
use clap::Parser;
use config::GatewayConfig;
use scheduler::Termination;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Predictive maintenance gateway: collects data from IO-Link sensors and
/// sends them to the cloud.
#[derive(Parser, Debug)]
#[command(name = "pmp-gateway", version)]
struct Cli {
    /// Configuration file (.json)
    #[arg(short = 'c', long = "config-file")]
    config_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    tracing_subscriber::fmt().init();
    info!("📡 Predictive Maintenance gateway starting...");

    let Some(config_file) = cli.config_file else {
        eprintln!("Usage: pmp-gateway [-h] -c <configuration_file>");
        return ExitCode::from(2);
    };

    let config = match GatewayConfig::load(&config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Exiting...");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let result = tokio::select! {
        result = session::run(config) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted. Exiting...");
            return ExitCode::SUCCESS;
        }
    };

    match result {
        Ok(Termination::QuotaReached) => {
            info!("Exiting...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            info!("Exiting...");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

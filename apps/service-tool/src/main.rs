use service_tool::cli::{Cli, Command};
use service_tool::commands::{ServeOptions, run_control_point, serve};
use service_tool::error::ServiceToolError;
use service_tool::logger::initialize as LoggerInitialize;

use link_core::config::ServiceToolConfig;
use link_core::session::{ConnectTarget, PeerInfo};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServiceToolError> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let log_dir = cli.log_dir();
    create_dir_all(&log_dir).map_err(|e| ServiceToolError::ServiceTool {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    LoggerInitialize(&log_dir, cli.verbose)?;

    info!("Service tool starting");
    info!("Log directory: {}", log_dir.display());
    if let Ok(path) = dotenv {
        info!("Loaded .env from: {}", path.display());
    }

    let config_dir = cli.config_dir();
    let mut config = ServiceToolConfig::load(&config_dir)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command {
        Command::Connect { cp_id, site, .. } => {
            run_control_point(&config, ConnectTarget::Discover(PeerInfo::new(cp_id, site))).await
        }
        Command::Attach { address } => {
            run_control_point(&config, ConnectTarget::Direct(address)).await
        }
        Command::Serve {
            backup,
            output,
            restore,
            ..
        } => {
            let options = ServeOptions {
                backup: backup.map(Into::into),
                output,
                restore,
                ..ServeOptions::from_config(&config)
            };
            let report = serve(&options).await?;

            match report.peer_info {
                Some(peer_info) => info!(
                    "Served control point {} ({})",
                    peer_info.identifier, peer_info.site
                ),
                None => info!("Served an anonymous control point"),
            }
            Ok(())
        }
    }
}

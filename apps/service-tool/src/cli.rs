use crate::APP_DIR_NAME;

use link_core::ANY_ADDRESS;
use link_core::backup::DbExportKind;
use link_core::config::ServiceToolConfig;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "service-tool")]
#[command(version)]
#[command(about = "Control point link to a service device", long_about = None)]
pub struct Cli {
    /// Directory holding config.json
    #[arg(long, env = "SERVICE_TOOL_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Directory for service-tool.log
    #[arg(long, env = "SERVICE_TOOL_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Service port, overrides the config file
    #[arg(long, env = "SERVICE_TOOL_PORT", global = true)]
    pub port: Option<u16>,

    /// More log output: -v debug, -vv trace, -vvv also the WebSocket stack
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Find the device on the local subnet and connect as a control point
    Connect {
        /// Control point identifier announced to the device
        #[arg(long)]
        cp_id: String,

        /// Site name announced to the device
        #[arg(long)]
        site: String,

        /// Own address to scan around, instead of the detected one
        #[arg(long)]
        local_address: Option<String>,
    },

    /// Connect as a control point to a known device address
    Attach {
        /// Device `host:port`
        address: String,
    },

    /// Act as the device: wait for one control point and drive it
    Serve {
        /// Listen address, defaults to the config's peer.bind_address
        #[arg(long)]
        bind: Option<String>,

        /// Request a backup of this database
        #[arg(long, value_enum)]
        backup: Option<BackupKind>,

        /// Where to write the backup archive
        #[arg(long, requires = "backup")]
        output: Option<PathBuf>,

        /// Archive to upload to the control point
        #[arg(long)]
        restore: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Data,
    Logs,
}

impl From<BackupKind> for DbExportKind {
    fn from(kind: BackupKind) -> Self {
        match kind {
            BackupKind::Data => DbExportKind::PrimaryData,
            BackupKind::Logs => DbExportKind::LogData,
        }
    }
}

impl Cli {
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(default_config_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }

    /// Fold command line overrides into `config`.
    pub fn apply_overrides(&self, config: &mut ServiceToolConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }

        match &self.command {
            Command::Connect {
                local_address: Some(local_address),
                ..
            } => config.network.local_address = Some(local_address.clone()),
            Command::Serve { bind: Some(bind), .. } => config.peer.bind_address = bind.clone(),
            Command::Serve { bind: None, .. } => {
                if let Some(port) = self.port {
                    config.peer.bind_address = format!("{ANY_ADDRESS}:{port}");
                }
            }
            _ => {}
        }
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join("logs")
}

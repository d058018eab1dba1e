use crate::error::ServiceToolError;

use link_core::config::ServiceToolConfig;
use link_core::session::{ConnectTarget, ConnectionState, SessionManager};

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

/// Connect as a control point and serve the device until it can no longer
/// be reached or the operator interrupts.
///
/// # Errors
///
/// Returns [`ServiceToolError::Core`] if the session cannot be established.
pub async fn run_control_point(
    config: &ServiceToolConfig,
    target: ConnectTarget,
) -> Result<(), ServiceToolError> {
    let manager = SessionManager::new(config.session_settings(), Arc::new(config.backup_store()));
    let mut changes = manager.subscribe_status();

    info!("Connecting to {target:?}");
    manager.connect(target).await?;

    if let Some(address) = manager.server_address().await {
        info!("Control point session open with {address}");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl+C: {e}");
                }
                info!("Interrupted, closing session");
                break;
            }
            change = changes.recv() => match change {
                Ok(status) if status.state == ConnectionState::Disconnected => {
                    match status.error {
                        Some(message) => {
                            error!("Device connection lost: {message}");
                            break;
                        }
                        None => info!("Device dropped the session, reconnecting"),
                    }
                }
                Ok(status) => info!("Connection status: {:?}", status.state),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {skipped} status changes"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    manager.end_session().await;
    Ok(())
}

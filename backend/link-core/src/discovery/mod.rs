//! Subnet scan for the fixed device.
//!
//! The client only knows its own address. It probes every host of its
//! `/24` on the service port and takes whichever answers first.
//!
//! All probes run at once in a [`JoinSet`]. The first reachable result in
//! completion order wins (not the lowest host number); the rest are aborted
//! and joined before [`scan`] returns, so no probe socket outlives the scan.

pub mod probe;

pub use probe::{ChannelProber, Prober, ScanResult};

use crate::error::discovery::DiscoveryError;

use common::ErrorLocation;

use std::ops::RangeInclusive;
use std::panic::Location;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use tokio::task::JoinSet;

/// Host suffixes probed in a subnet.
pub const HOST_RANGE: RangeInclusive<u8> = 1..=254;

/// Network part of a dotted address: everything before the last dot.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidInput`] if `local_address` has no dot or
/// nothing before it.
#[track_caller]
pub fn subnet_prefix(local_address: &str) -> Result<&str, DiscoveryError> {
    match local_address.rsplit_once('.') {
        Some((prefix, _)) if !prefix.is_empty() => Ok(prefix),
        _ => Err(DiscoveryError::InvalidInput {
            message: format!("'{local_address}' is not a dotted network address"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

/// Every `prefix.host:port` address probed for `local_address`.
#[track_caller]
pub fn candidate_addresses(local_address: &str, port: u16) -> Result<Vec<String>, DiscoveryError> {
    let prefix = subnet_prefix(local_address)?;
    Ok(HOST_RANGE
        .map(|host| format!("{prefix}.{host}:{port}"))
        .collect())
}

/// Find the server on `local_address`'s subnet.
///
/// # Returns
///
/// The winning `host:port`.
///
/// # Errors
///
/// - [`DiscoveryError::InvalidInput`] if `local_address` is malformed (no
///   probe is started)
/// - [`DiscoveryError::NotFound`] if every probe was unreachable
pub async fn scan(
    local_address: &str,
    port: u16,
    prober: Arc<dyn Prober>,
) -> Result<String, DiscoveryError> {
    let candidates = candidate_addresses(local_address, port)?;
    let total = candidates.len();

    debug!("Scanning {total} hosts around {local_address} on port {port}");

    let mut probes = JoinSet::new();
    for address in candidates {
        let prober = Arc::clone(&prober);
        probes.spawn(async move { prober.probe(address).await });
    }

    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok(ScanResult {
                address,
                reachable: true,
            }) => {
                info!("Server answered at {address}");
                probes.abort_all();
                while probes.join_next().await.is_some() {}
                return Ok(address);
            }
            Ok(result) => trace!("{} unreachable", result.address),
            Err(e) => warn!("Probe task failed: {e}"),
        }
    }

    Err(DiscoveryError::NotFound {
        message: format!(
            "Service tool server was not found ({total} hosts probed on port {port})"
        ),
        location: ErrorLocation::from(Location::caller()),
    })
}

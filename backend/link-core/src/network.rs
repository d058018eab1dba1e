//! Local address lookup for the subnet scan.

use crate::LOOPBACK_ADDRESS;

use std::net::{IpAddr, UdpSocket};

use log::{debug, warn};

/// Any routable address; nothing is sent to it.
const ROUTE_PROBE_TARGET: &str = "10.254.254.254:1";

/// IPv4 address of the interface that routes to the local network.
///
/// Connecting a UDP socket only asks the OS for a route, it does not send a
/// packet. Falls back to loopback when there is no usable IPv4 route.
pub fn resolve_local_network_address() -> String {
    match route_local_ip() {
        Some(IpAddr::V4(ip)) if !ip.is_unspecified() => {
            debug!("Local network address resolved to {ip}");
            ip.to_string()
        }
        other => {
            warn!("No IPv4 route found ({other:?}), using {LOOPBACK_ADDRESS}");
            LOOPBACK_ADDRESS.to_string()
        }
    }
}

fn route_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(ROUTE_PROBE_TARGET).ok()?;
    socket.local_addr().ok().map(|address| address.ip())
}

//! Control point link to a fixed service device.
//!
//! - [`discovery`] finds the device on the local subnet
//! - [`session`] owns the control point connection and its status
//! - [`rpc`] answers named requests from the device
//! - [`backup`] packs database exports and unpacks imports
//! - [`peer`] is the device side, used by the tool's serve mode and tests

pub mod backup;
pub mod channel;
pub mod config;
pub mod discovery;
pub mod error;
pub mod network;
pub mod peer;
pub mod rpc;
pub mod session;
pub mod store;
pub mod wire;

#[cfg(test)]
mod tests;

use std::time::Duration;

use const_format::concatcp;

pub const CHANNEL_SCHEME: &str = "ws://";
pub const DEFAULT_PORT: u16 = 8988;
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(5);

pub const LOOPBACK_ADDRESS: &str = "127.0.0.1";
pub const ANY_ADDRESS: &str = "0.0.0.0";

pub const DEFAULT_BIND_ADDRESS: &str = concatcp!(ANY_ADDRESS, ":", DEFAULT_PORT);

use crate::channel::{ChannelOptions, DuplexChannel};

use std::time::Duration;

use async_trait::async_trait;
use log::trace;

/// Reachability of one probed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub address: String,
    pub reachable: bool,
}

/// Tests whether a server answers at an address.
///
/// A probe must release whatever it opened before returning.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: String) -> ScanResult;
}

/// Probes by opening a one-shot `TEST` channel and closing it straight away.
#[derive(Debug, Clone)]
pub struct ChannelProber {
    timeout: Duration,
}

impl ChannelProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Prober for ChannelProber {
    async fn probe(&self, address: String) -> ScanResult {
        let channel = match DuplexChannel::new(&address, ChannelOptions::probe(self.timeout)) {
            Ok(channel) => channel,
            Err(e) => {
                trace!("Skipping probe of {address}: {e}");
                return ScanResult {
                    address,
                    reachable: false,
                };
            }
        };

        let reachable = match channel.connect().await {
            Ok(()) => true,
            Err(e) => {
                trace!("Probe of {address} failed: {e}");
                false
            }
        };

        channel.disconnect().await;

        ScanResult { address, reachable }
    }
}

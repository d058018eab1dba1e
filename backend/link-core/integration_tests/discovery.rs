use crate::helpers::{
    FakeProber, TEST_CHANNEL_TIMEOUT, TEST_WAIT, eventually, start_peer_server, unused_address,
};

use link_core::discovery::{ChannelProber, HOST_RANGE, Prober, candidate_addresses, scan};
use link_core::error::DiscoveryError;

use std::sync::Arc;
use std::time::{Duration, Instant};

/// **VALUE**: Verifies a real server on the subnet is found by the channel prober.
///
/// **WHY THIS MATTERS**: This is the whole point of discovery: the control point
/// only knows its own address and must land on the device's `host:port`.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Wrong subnet prefix derivation
/// - Probes sent to the wrong port
/// - Returning a bare host instead of `host:port`
#[tokio::test]
async fn given_server_on_subnet_when_scanned_then_returns_its_address() {
    // GIVEN: A peer endpoint on 127.0.0.1 and a client somewhere else on 127.0.0.0/24
    let server = start_peer_server().await;
    let port = server.local_addr().port();
    let prober: Arc<dyn Prober> = Arc::new(ChannelProber::new(TEST_CHANNEL_TIMEOUT));

    // WHEN: Scanning from the client's address
    let address = scan("127.0.0.77", port, prober).await.unwrap();

    // THEN: The server's address is returned and it saw a probe
    assert_eq!(address, format!("127.0.0.1:{port}"));
    assert!(server.probes_seen() >= 1);
}

/// **VALUE**: Verifies no probe channel stays open once `scan` returned.
///
/// **WHY THIS MATTERS**: A scan opens up to 254 sockets. Leaked probe
/// connections pile up on the device, which only expects one control point.
///
/// **BUG THIS CATCHES**: Would catch a probe that skips `disconnect()` on
/// success, or losing probes that were still running when the winner came in.
#[tokio::test]
async fn given_successful_scan_when_finished_then_no_probe_left_open() {
    // GIVEN: A reachable server
    let server = start_peer_server().await;
    let port = server.local_addr().port();
    let prober: Arc<dyn Prober> = Arc::new(ChannelProber::new(TEST_CHANNEL_TIMEOUT));

    // WHEN: The scan completes
    scan("127.0.0.3", port, prober).await.unwrap();

    // THEN: The device sees every probe closed
    eventually(|| server.probes_open() == 0, "probe connections to close").await;
}

/// **VALUE**: Verifies an empty subnet yields `NotFound`.
///
/// **BUG THIS CATCHES**: Would catch a scan that hangs or returns an
/// unreachable address when nobody answers.
#[tokio::test]
async fn given_no_reachable_host_when_scanned_then_not_found() {
    // GIVEN: A prober for which every host is down
    let prober = Arc::new(FakeProber::none());

    // WHEN: Scanning
    let result = scan("192.168.10.40", 8988, prober.clone()).await;

    // THEN: NotFound after probing the full host range
    assert!(matches!(result, Err(DiscoveryError::NotFound { .. })));
    assert_eq!(prober.calls(), HOST_RANGE.count());
}

/// **VALUE**: Verifies the scan returns on the first success instead of
/// waiting for slow unreachable hosts.
///
/// **WHY THIS MATTERS**: Unreachable hosts time out after the full probe
/// timeout; waiting on them would make every connect take that long.
///
/// **BUG THIS CATCHES**: Would catch joining every probe before picking a result.
#[tokio::test]
async fn given_slow_unreachable_hosts_when_scanned_then_first_success_wins() {
    // GIVEN: One instant winner and 253 hosts that take far longer than the test budget
    let prober = Arc::new(FakeProber::new(
        &["10.0.0.42:8988"],
        Duration::from_secs(60),
    ));
    let started = Instant::now();

    // WHEN: Scanning
    let address = scan("10.0.0.5", 8988, prober).await.unwrap();

    // THEN: The winner is returned well before any slow probe would finish
    assert_eq!(address, "10.0.0.42:8988");
    assert!(started.elapsed() < TEST_WAIT);
}

/// **VALUE**: Verifies a malformed local address fails before any probe.
///
/// **BUG THIS CATCHES**: Would catch scanning a garbage prefix such as
/// `"localhost.1"` style hosts, or panicking on the missing dot.
#[tokio::test]
async fn given_address_without_dot_when_scanned_then_invalid_input_and_no_probe() {
    let prober = Arc::new(FakeProber::none());

    let result = scan("localhost", 8988, prober.clone()).await;

    assert!(matches!(result, Err(DiscoveryError::InvalidInput { .. })));
    assert_eq!(prober.calls(), 0);
}

/// **VALUE**: Verifies the candidate list covers hosts 1 to 254 on the port.
#[test]
fn given_local_address_when_candidates_listed_then_full_host_range() {
    let candidates = candidate_addresses("172.16.4.9", 8988).unwrap();

    assert_eq!(candidates.len(), 254);
    assert_eq!(candidates.first().unwrap(), "172.16.4.1:8988");
    assert_eq!(candidates.last().unwrap(), "172.16.4.254:8988");
    assert!(!candidates.contains(&"172.16.4.0:8988".to_string()));
    assert!(!candidates.contains(&"172.16.4.255:8988".to_string()));
}

/// **VALUE**: Verifies a single probe against a dead port is reported unreachable.
#[tokio::test]
async fn given_closed_port_when_probed_then_unreachable() {
    let address = unused_address().await;
    let prober = ChannelProber::new(TEST_CHANNEL_TIMEOUT);

    let result = prober.probe(address.clone()).await;

    assert_eq!(result.address, address);
    assert!(!result.reachable);
}

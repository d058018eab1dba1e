use crate::network::resolve_local_network_address;

use std::net::Ipv4Addr;

/// **VALUE**: Verifies the resolved local address is always a dotted IPv4.
///
/// **WHY THIS MATTERS**: Discovery derives the subnet by dropping the last
/// octet; anything else makes the scan fail before it starts.
#[test]
fn given_any_host_when_resolving_then_returns_dotted_ipv4() {
    let address = resolve_local_network_address();

    assert!(address.parse::<Ipv4Addr>().is_ok(), "{address}");
}

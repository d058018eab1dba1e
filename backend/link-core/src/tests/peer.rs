// Unit tests for identity routing on the device endpoint.

use crate::peer::identity_of;
use crate::wire::ConnectionIdentity;

use tokio_tungstenite::tungstenite::handshake::server::Request;

fn upgrade_request(uri: &str) -> Request {
    Request::builder().uri(uri).body(()).unwrap()
}

#[test]
fn given_cp_query_when_identity_read_then_control_point() {
    let request = upgrade_request("/?identity=CP");

    assert_eq!(identity_of(&request), Ok(ConnectionIdentity::ControlPoint));
}

#[test]
fn given_test_query_among_others_when_identity_read_then_probe() {
    let request = upgrade_request("/?EIO=4&identity=TEST&transport=websocket");

    assert_eq!(identity_of(&request), Ok(ConnectionIdentity::Test));
}

/// **VALUE**: Verifies connections without a usable identity are refused.
///
/// **BUG THIS CATCHES**: Would catch defaulting a missing or unknown
/// identity to `CP`, which lets any client take the control point slot.
#[test]
fn given_missing_or_unknown_identity_when_identity_read_then_error() {
    assert!(identity_of(&upgrade_request("/")).is_err());
    assert!(identity_of(&upgrade_request("/?identity=ADMIN")).is_err());
}

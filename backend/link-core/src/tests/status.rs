// Unit tests for status transitions.

use crate::session::{ConnectionState, StatusCommand, StatusTracker};

/// **VALUE**: Verifies a repeated Connected is not broadcast again.
///
/// **WHY THIS MATTERS**: Reconnect signals can arrive while already
/// connected; the UI must not flash or log a second transition.
#[tokio::test]
async fn given_connected_when_connected_again_then_no_duplicate_notification() {
    // GIVEN: A connected tracker with a fresh subscriber
    let tracker = StatusTracker::new();
    tracker.apply(StatusCommand::Connected).await;
    let mut changes = tracker.subscribe();

    // WHEN: Connected is applied again
    tracker.apply(StatusCommand::Connected).await;

    // THEN: Nothing is published
    assert!(changes.try_recv().is_err());
    assert!(tracker.current().await.is_connected());
}

#[tokio::test]
async fn given_failure_when_disconnected_then_error_kept() {
    let tracker = StatusTracker::new();
    tracker.apply(StatusCommand::Failed("refused".into())).await;

    let status = tracker.apply(StatusCommand::Disconnected).await;

    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.error.as_deref(), Some("refused"));
}

#[tokio::test]
async fn given_error_when_begin_connect_then_error_cleared() {
    let tracker = StatusTracker::new();
    tracker.apply(StatusCommand::Failed("refused".into())).await;

    let status = tracker.apply(StatusCommand::BeginConnect).await;

    assert_eq!(status.state, ConnectionState::Connecting);
    assert_eq!(status.error, None);
}

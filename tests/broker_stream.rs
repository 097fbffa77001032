//! Subscriber-facing behaviour of the log broker across a build's life.

use obtura_builder::broker::LogBroker;
use obtura_builder::model::{BuildEvent, BuildStatus, LogLevel};

#[tokio::test]
async fn subscriber_attaching_mid_build_sees_later_events_then_complete() {
    let broker = LogBroker::new();

    // Three lines are published before anyone subscribes.
    for i in 0..3 {
        broker
            .publish_log("b1", LogLevel::Info, &format!("early {}", i))
            .await;
    }

    let mut sub = broker.subscribe("b1");
    match sub.recv().await {
        Some(BuildEvent::Connected { build_id, .. }) => assert_eq!(build_id, "b1"),
        other => panic!("expected connected, got {:?}", other),
    }

    broker.publish_log("b1", LogLevel::Info, "late line").await;
    broker
        .publish_status("b1", BuildStatus::Building, "Building container images")
        .await;
    broker
        .publish_build_complete("b1", BuildStatus::Completed)
        .await;

    match sub.recv().await {
        Some(BuildEvent::Log { message, .. }) => assert_eq!(message, "late line"),
        other => panic!("expected the late log, got {:?}", other),
    }
    match sub.recv().await {
        Some(BuildEvent::Status { status, .. }) => assert_eq!(status, BuildStatus::Building),
        other => panic!("expected status, got {:?}", other),
    }
    match sub.recv().await {
        Some(BuildEvent::Complete { status, .. }) => assert_eq!(status, "success"),
        other => panic!("expected complete, got {:?}", other),
    }

    // The terminal event closes the subscription.
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn each_build_has_an_isolated_topic() {
    let broker = LogBroker::new();
    let mut sub_a = broker.subscribe("build-a");
    let mut sub_b = broker.subscribe("build-b");

    assert!(matches!(sub_a.recv().await, Some(BuildEvent::Connected { .. })));
    assert!(matches!(sub_b.recv().await, Some(BuildEvent::Connected { .. })));

    broker.publish_log("build-a", LogLevel::Info, "only for a").await;
    broker
        .publish_build_complete("build-b", BuildStatus::Failed)
        .await;

    match sub_a.recv().await {
        Some(BuildEvent::Log { message, .. }) => assert_eq!(message, "only for a"),
        other => panic!("expected log for build-a, got {:?}", other),
    }
    match sub_b.recv().await {
        Some(BuildEvent::Complete { status, .. }) => assert_eq!(status, "failed"),
        other => panic!("expected complete for build-b, got {:?}", other),
    }
}

#[tokio::test]
async fn multiple_subscribers_all_receive_each_event() {
    let broker = LogBroker::new();
    let mut subs = vec![
        broker.subscribe("b1"),
        broker.subscribe("b1"),
        broker.subscribe("b1"),
    ];
    for sub in &mut subs {
        assert!(matches!(sub.recv().await, Some(BuildEvent::Connected { .. })));
    }

    broker.publish_log("b1", LogLevel::Success, "fan out").await;

    for sub in &mut subs {
        match sub.recv().await {
            Some(BuildEvent::Log { level, message, .. }) => {
                assert_eq!(level, LogLevel::Success);
                assert_eq!(message, "fan out");
            }
            other => panic!("expected log, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn terminal_labels_reach_subscribers_verbatim_except_completed() {
    for (status, expected) in [
        (BuildStatus::Completed, "success"),
        (BuildStatus::Failed, "failed"),
        (BuildStatus::Timeout, "timeout"),
        (BuildStatus::Rejected, "rejected"),
    ] {
        let broker = LogBroker::new();
        let mut sub = broker.subscribe("b1");
        assert!(matches!(sub.recv().await, Some(BuildEvent::Connected { .. })));

        broker.publish_build_complete("b1", status).await;
        match sub.recv().await {
            Some(BuildEvent::Complete { status, .. }) => assert_eq!(status, expected),
            other => panic!("expected complete, got {:?}", other),
        }
    }
}

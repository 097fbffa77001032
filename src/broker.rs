//! In-process pub/sub for live build logs and status transitions.
//!
//! One broker serves the whole process. Publishers never block on a slow
//! subscriber: a delivery that cannot be handed over within
//! [`PUBLISH_TIMEOUT`] is dropped with a warning while the durable log row
//! is written independently by the caller. Subscribers receive an initial
//! `connected` event, then `log`/`status` events in publish order, a
//! heartbeat every 15 seconds, and finally a `complete` event that ends
//! the subscription.

use crate::model::{BuildEvent, BuildStatus, LogLevel};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How long a publisher waits for a subscriber queue before dropping.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_millis(100);

/// Interval between keep-alive events on a subscriber stream.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Delay between the terminal event and forcible subscriber close, giving
/// queued deliveries a chance to drain.
const COMPLETE_GRACE: Duration = Duration::from_millis(250);

const SUBSCRIBER_BUFFER: usize = 64;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<BuildEvent>,
}

#[derive(Default)]
struct Inner {
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: std::sync::atomic::AtomicU64,
}

/// Process-wide log broker. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct LogBroker {
    inner: Arc<Inner>,
}

impl LogBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a subscriber to one build's event stream.
    ///
    /// The returned [`Subscription`] yields events from the point of
    /// subscription onward; earlier events are not replayed.
    pub fn subscribe(&self, build_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self
            .inner
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        // The greeting is queued before the sender is registered, so it is
        // always the first event the subscriber sees.
        let _ = tx.try_send(BuildEvent::Connected {
            build_id: build_id.to_string(),
            message: "Connected to build logs".to_string(),
        });

        let mut topics = self.inner.topics.write().expect("broker lock poisoned");
        let subscribers = topics.entry(build_id.to_string()).or_default();
        subscribers.push(Subscriber { id, tx });
        debug!(build_id, total = subscribers.len(), "subscriber attached");

        Subscription {
            broker: self.clone(),
            build_id: build_id.to_string(),
            id,
            rx,
            heartbeat: tokio::time::interval_at(
                tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
                HEARTBEAT_INTERVAL,
            ),
            done: false,
        }
    }

    /// Publishes one log line to every subscriber of `build_id`.
    pub async fn publish_log(&self, build_id: &str, level: LogLevel, message: &str) {
        self.fan_out(
            build_id,
            BuildEvent::Log {
                build_id: build_id.to_string(),
                level,
                message: message.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await;
    }

    /// Publishes a status transition to every subscriber of `build_id`.
    pub async fn publish_status(&self, build_id: &str, status: BuildStatus, message: &str) {
        self.fan_out(
            build_id,
            BuildEvent::Status {
                build_id: build_id.to_string(),
                status,
                message: message.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await;
    }

    /// Publishes the terminal event and closes the build's subscribers
    /// after a short grace window. `completed` is normalised to `success`.
    pub async fn publish_build_complete(&self, build_id: &str, status: BuildStatus) {
        self.fan_out(
            build_id,
            BuildEvent::Complete {
                build_id: build_id.to_string(),
                status: status.terminal_label().to_string(),
                timestamp: Utc::now(),
            },
        )
        .await;

        let inner = Arc::clone(&self.inner);
        let build_id = build_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(COMPLETE_GRACE).await;
            let mut topics = inner.topics.write().expect("broker lock poisoned");
            if let Some(removed) = topics.remove(&build_id) {
                debug!(build_id, closed = removed.len(), "build topic closed");
            }
        });
    }

    /// Number of live subscribers for a build. Test and introspection aid.
    pub fn subscriber_count(&self, build_id: &str) -> usize {
        self.inner
            .topics
            .read()
            .expect("broker lock poisoned")
            .get(build_id)
            .map_or(0, Vec::len)
    }

    async fn fan_out(&self, build_id: &str, event: BuildEvent) {
        // Senders are cloned out so the lock is never held across an await.
        let senders: Vec<(u64, mpsc::Sender<BuildEvent>)> = {
            let topics = self.inner.topics.read().expect("broker lock poisoned");
            match topics.get(build_id) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|s| (s.id, s.tx.clone()))
                    .collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        for (id, tx) in senders {
            match tx.send_timeout(event.clone(), PUBLISH_TIMEOUT).await {
                Ok(()) => {}
                Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                    warn!(build_id, subscriber = id, "subscriber queue full, delivery dropped");
                }
                Err(mpsc::error::SendTimeoutError::Closed(_)) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut topics = self.inner.topics.write().expect("broker lock poisoned");
            if let Some(subscribers) = topics.get_mut(build_id) {
                subscribers.retain(|s| !dead.contains(&s.id));
                if subscribers.is_empty() {
                    topics.remove(build_id);
                }
            }
        }
    }

    fn unsubscribe(&self, build_id: &str, id: u64) {
        let mut topics = self.inner.topics.write().expect("broker lock poisoned");
        if let Some(subscribers) = topics.get_mut(build_id) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                topics.remove(build_id);
            }
        }
    }
}

/// One subscriber's view of a build's event stream.
///
/// Dropping the subscription detaches it from the broker without touching
/// the build or any other subscriber.
pub struct Subscription {
    broker: LogBroker,
    build_id: String,
    id: u64,
    rx: mpsc::Receiver<BuildEvent>,
    heartbeat: tokio::time::Interval,
    done: bool,
}

impl Subscription {
    /// Returns the next event, interleaving heartbeats. `None` once the
    /// terminal event has been delivered or the topic was closed.
    pub async fn recv(&mut self) -> Option<BuildEvent> {
        if self.done {
            return None;
        }
        tokio::select! {
            biased;
            event = self.rx.recv() => {
                match event {
                    Some(event) => {
                        if matches!(event, BuildEvent::Complete { .. }) {
                            self.done = true;
                        }
                        Some(event)
                    }
                    None => {
                        self.done = true;
                        None
                    }
                }
            }
            _ = self.heartbeat.tick() => {
                Some(BuildEvent::Heartbeat { timestamp: Utc::now() })
            }
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(&self.build_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_gets_connected_greeting_first() {
        let broker = LogBroker::new();
        let mut sub = broker.subscribe("b1");
        match sub.recv().await {
            Some(BuildEvent::Connected { build_id, .. }) => assert_eq!(build_id, "b1"),
            other => panic!("expected connected event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn logs_are_delivered_in_publish_order() {
        let broker = LogBroker::new();
        let mut sub = broker.subscribe("b1");
        assert!(matches!(sub.recv().await, Some(BuildEvent::Connected { .. })));

        for i in 0..5 {
            broker
                .publish_log("b1", LogLevel::Info, &format!("line {}", i))
                .await;
        }

        for i in 0..5 {
            match sub.recv().await {
                Some(BuildEvent::Log { message, .. }) => {
                    assert_eq!(message, format!("line {}", i));
                }
                other => panic!("expected log event, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn complete_event_ends_the_subscription() {
        let broker = LogBroker::new();
        let mut sub = broker.subscribe("b1");
        assert!(matches!(sub.recv().await, Some(BuildEvent::Connected { .. })));

        broker
            .publish_build_complete("b1", BuildStatus::Completed)
            .await;

        match sub.recv().await {
            Some(BuildEvent::Complete { status, .. }) => assert_eq!(status, "success"),
            other => panic!("expected complete event, got {:?}", other),
        }
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn status_arrives_after_earlier_logs() {
        let broker = LogBroker::new();
        let mut sub = broker.subscribe("b1");
        assert!(matches!(sub.recv().await, Some(BuildEvent::Connected { .. })));

        broker.publish_log("b1", LogLevel::Info, "cloning").await;
        broker
            .publish_status("b1", BuildStatus::Cloning, "Cloning repository")
            .await;

        assert!(matches!(sub.recv().await, Some(BuildEvent::Log { .. })));
        match sub.recv().await {
            Some(BuildEvent::Status { status, .. }) => assert_eq!(status, BuildStatus::Cloning),
            other => panic!("expected status event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn dropping_a_subscriber_leaves_others_attached() {
        let broker = LogBroker::new();
        let sub_a = broker.subscribe("b1");
        let _sub_b = broker.subscribe("b1");
        assert_eq!(broker.subscriber_count("b1"), 2);

        drop(sub_a);
        assert_eq!(broker.subscriber_count("b1"), 1);
    }

    #[tokio::test]
    async fn publish_to_unknown_build_is_a_no_op() {
        let broker = LogBroker::new();
        broker.publish_log("nope", LogLevel::Info, "hello").await;
        assert_eq!(broker.subscriber_count("nope"), 0);
    }

    #[tokio::test]
    async fn late_subscriber_sees_only_later_events() {
        let broker = LogBroker::new();
        broker.publish_log("b1", LogLevel::Info, "early").await;

        let mut sub = broker.subscribe("b1");
        assert!(matches!(sub.recv().await, Some(BuildEvent::Connected { .. })));

        broker.publish_log("b1", LogLevel::Info, "late").await;
        match sub.recv().await {
            Some(BuildEvent::Log { message, .. }) => assert_eq!(message, "late"),
            other => panic!("expected log event, got {:?}", other),
        }
    }
}

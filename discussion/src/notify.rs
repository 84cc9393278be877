use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::comment::{Pid, Sid, Uid};

/// Who a realtime event is meant for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Audience {
    User(Uid),
    Users(Vec<Uid>),
    Post(Pid),
    Sub(Sid),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: Value,
    pub audience: Audience,
}

/// Fire-and-forget delivery of realtime events. Delivery failures never
/// reach the caller.
pub trait NotifySink: Send + Sync {
    fn notify(&self, event: &str, payload: Value, audience: Audience);
}

pub struct BroadcastNotifier {
    events: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotifySink for BroadcastNotifier {
    fn notify(&self, event: &str, payload: Value, audience: Audience) {
        let notification = Notification {
            event: event.to_string(),
            payload,
            audience,
        };
        // no subscribers
        if self.events.send(notification).is_err() {
            tracing::trace!(event, "notification dropped");
        }
    }
}

/// Drops every event.
pub struct NullNotifier;

impl NotifySink for NullNotifier {
    fn notify(&self, _event: &str, _payload: Value, _audience: Audience) {}
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.notify("score", json!({ "score": 3 }), Audience::Post(7));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "score");
        assert_eq!(received.payload["score"], 3);
        assert_eq!(received.audience, Audience::Post(7));
    }

    #[test]
    fn test_notify_without_subscribers_does_not_fail() {
        let notifier = BroadcastNotifier::new(8);
        notifier.notify("score", Value::Null, Audience::User("u".into()));
    }
}

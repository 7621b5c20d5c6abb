use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events a popup coordinator reports to its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PopupEvent {
    /// The popup went away. `error` is set only when the popup itself
    /// reported a failure; user-initiated closes carry `None`.
    Closed { error: Option<String> },
}

impl PopupEvent {
    pub fn closed() -> Self {
        Self::Closed { error: None }
    }

    pub fn closed_with_error(error: impl Into<String>) -> Self {
        Self::Closed {
            error: Some(error.into()),
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<PopupEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PopupEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: PopupEvent) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!("popup event published with no subscribers");
                0
            }
        }
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(PopupEvent::closed());

        let event = rx.recv().await.unwrap();
        assert_eq!(event, PopupEvent::Closed { error: None });
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PopupEvent::closed_with_error("Popup error: boom"));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, PopupEvent::Closed { error: Some(ref m) } if m == "Popup error: boom"));
        assert_eq!(e1, e2);
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(PopupEvent::closed()), 0);
    }

    #[test]
    fn cloned_bus_shares_subscribers() {
        let bus = EventBus::new(16);
        let clone = bus.clone();
        let _rx = bus.subscribe();
        assert_eq!(clone.publish(PopupEvent::closed()), 1);
    }

    #[test]
    fn closed_event_serializes_tagged() {
        let json = serde_json::to_value(PopupEvent::closed()).unwrap();
        assert_eq!(json["type"], "Closed");
        assert!(json["data"]["error"].is_null());
    }
}

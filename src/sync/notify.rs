//! Cross-view change notification: keeps duplicate views of the same
//! item visually consistent after a completion toggle. Best-effort
//! fan-out — no acknowledgment, no replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A completion flip broadcast to every other open screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUpdate {
    pub item_id: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// The screen that performed the toggle; it ignores its own updates
    pub origin: String,
}

/// Pub/sub notifier for completion changes across screens.
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<CompletionUpdate>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    /// Create a new ChangeNotifier with a buffer of 100 messages.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        ChangeNotifier { tx }
    }

    /// Subscribe to receive completion updates.
    pub fn subscribe(&self) -> broadcast::Receiver<CompletionUpdate> {
        self.tx.subscribe()
    }

    /// Broadcast an update to all subscribers. Lagging or absent
    /// receivers are not an error.
    pub fn notify(&self, update: CompletionUpdate) {
        let _ = self.tx.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: &str, origin: &str) -> CompletionUpdate {
        CompletionUpdate {
            item_id: id.to_string(),
            is_completed: true,
            completed_at: Some(Utc::now()),
            origin: origin.to_string(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_updates() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();

        notifier.notify(update("itm-0001", "today"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.item_id, "itm-0001");
        assert_eq!(received.origin, "today");
    }

    #[tokio::test]
    async fn notify_without_subscribers_does_not_panic() {
        let notifier = ChangeNotifier::new();
        notifier.notify(update("itm-0001", "today"));
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_update() {
        let notifier = ChangeNotifier::new();
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();

        notifier.notify(update("itm-0001", "today"));
        notifier.notify(update("itm-0002", "project"));

        assert_eq!(rx1.recv().await.unwrap().item_id, "itm-0001");
        assert_eq!(rx1.recv().await.unwrap().item_id, "itm-0002");
        assert_eq!(rx2.recv().await.unwrap().item_id, "itm-0001");
        assert_eq!(rx2.recv().await.unwrap().item_id, "itm-0002");
    }
}

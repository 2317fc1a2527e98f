//! services/api/src/adapters/notify.rs
//!
//! Fans store notices out to every connected WebSocket client.

use textbook_core::{domain::Notice, ports::NotificationService};
use tokio::sync::broadcast;
use tracing::{debug, info};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService for BroadcastNotifier {
    fn notify(&self, notice: Notice) {
        info!(level = ?notice.level, message = %notice.message, "Notice");
        // No subscribers is fine; the notice is still logged.
        if let Ok(receivers) = self.sender.send(notice) {
            debug!(receivers, "Notice delivered");
        }
    }
}

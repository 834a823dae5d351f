//! Fire-and-forget user notifications.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

/// Display hint for confirmations such as cart changes and empty-cart guards.
pub const SHORT_NOTICE: Duration = Duration::from_millis(2000);

/// Display hint for outcomes and errors.
pub const LONG_NOTICE: Duration = Duration::from_millis(3000);

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, duration: Duration);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub duration: Duration,
}

/// Forwards notifications to whoever renders them.
impl Notifier for mpsc::UnboundedSender<Notification> {
    fn notify(&self, message: &str, duration: Duration) {
        let sent = self.send(Notification {
            message: message.to_string(),
            duration,
        });
        if sent.is_err() {
            debug!(message, "Notification dropped, no receiver");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        tx.notify("Cart cleared", SHORT_NOTICE);
        let note = rx.try_recv().unwrap();
        assert_eq!(note.message, "Cart cleared");
        assert_eq!(note.duration, SHORT_NOTICE);
    }

    #[test]
    fn test_channel_notifier_ignores_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<Notification>();
        drop(rx);
        tx.notify("nobody listening", LONG_NOTICE);
    }
}

//! User-visible failure notices.
//!
//! Stores report failed mutations here instead of panicking or printing. The
//! front-end decides how to render them (toast, status line, log).

use std::fmt;

use tokio::sync::mpsc;

/// A failure the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Collection the operation ran against (`cart`, `notifications`).
    pub collection: &'static str,
    /// Operation name (`add_item`, `mark_all_as_read`, ...).
    pub action: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.collection, self.message)
    }
}

/// Sink for [`Notice`]s.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::warn!(
            collection = notice.collection,
            action = notice.action,
            "{}",
            notice.message
        );
    }
}

/// Forwards notices to a channel read by the UI.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // Receiver gone means nobody is displaying notices anymore
        if self.tx.send(notice).is_err() {
            tracing::debug!("Notice receiver dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_display() {
        let notice = Notice {
            collection: "cart",
            action: "add_item",
            message: "Stock insuffisant".to_string(),
        };
        assert_eq!(notice.to_string(), "[cart] Stock insuffisant");
    }

    #[test]
    fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(Notice {
            collection: "notifications",
            action: "delete",
            message: "gone".to_string(),
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.action, "delete");
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Notice {
            collection: "cart",
            action: "clear",
            message: "ignored".to_string(),
        });
    }
}

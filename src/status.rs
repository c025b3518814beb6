//! Status reporting towards the user-facing shell.
//!
//! Session events fire on the transport's callback context. Shells that own
//! their UI on a particular thread should use [`ChannelStatusReporter`] and
//! drain the receiver from that thread.

use tokio::sync::mpsc;
use tracing::trace;

/// What the shell's connect button should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// Offer to start a connection.
    Connect,
    /// Offer to tear the connection down.
    Disconnect,
}

impl std::fmt::Display for ButtonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "Connect"),
            Self::Disconnect => write!(f, "Disconnect"),
        }
    }
}

/// Sink for user-visible status changes.
#[cfg_attr(test, mockall::automock)]
pub trait StatusReporter: Send + Sync {
    /// Replace the status text.
    fn set_status(&self, text: &str);

    /// Change the connect button.
    fn set_connect_button(&self, state: ButtonState);
}

/// One queued status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// New status text.
    Status(String),
    /// New button state.
    Button(ButtonState),
}

/// Forwards status changes over a channel to the UI-owning task.
#[derive(Debug, Clone)]
pub struct ChannelStatusReporter {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelStatusReporter {
    /// Create a reporter and the receiver the UI side drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, update: StatusUpdate) {
        if self.tx.send(update).is_err() {
            trace!("Status receiver dropped");
        }
    }
}

impl StatusReporter for ChannelStatusReporter {
    fn set_status(&self, text: &str) {
        self.push(StatusUpdate::Status(text.to_string()));
    }

    fn set_connect_button(&self, state: ButtonState) {
        self.push(StatusUpdate::Button(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_reporter_preserves_order() {
        let (reporter, mut rx) = ChannelStatusReporter::new();
        reporter.set_status("Connected to BP07");
        reporter.set_connect_button(ButtonState::Disconnect);

        assert_eq!(
            rx.try_recv().unwrap(),
            StatusUpdate::Status("Connected to BP07".to_string())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusUpdate::Button(ButtonState::Disconnect)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_reporter_survives_closed_receiver() {
        let (reporter, rx) = ChannelStatusReporter::new();
        drop(rx);
        reporter.set_status("ignored");
    }

    #[test]
    fn test_updates_cross_threads() {
        let (reporter, mut rx) = ChannelStatusReporter::new();
        std::thread::spawn(move || reporter.set_status("from callback"))
            .join()
            .unwrap();
        assert_eq!(
            rx.blocking_recv(),
            Some(StatusUpdate::Status("from callback".to_string()))
        );
    }

    #[test]
    fn test_receiver_ends_with_last_reporter() {
        let (reporter, mut rx) = ChannelStatusReporter::new();
        let clone = reporter.clone();
        drop(reporter);
        clone.set_status("BLE Disconnected");
        drop(clone);

        assert_eq!(
            tokio_test::block_on(rx.recv()),
            Some(StatusUpdate::Status("BLE Disconnected".to_string()))
        );
        assert_eq!(tokio_test::block_on(rx.recv()), None);
    }

    #[test]
    fn test_button_display() {
        assert_eq!(ButtonState::Connect.to_string(), "Connect");
        assert_eq!(ButtonState::Disconnect.to_string(), "Disconnect");
    }
}

//! Connection lifecycle states.

/// Lifecycle state of a band connection.
///
/// `Disconnected` is terminal: reconnecting needs a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Waiting for a discovered band.
    #[default]
    Idle,
    /// Link establishment in progress.
    Connecting,
    /// Link up; waiting for, or parked after, GATT service discovery.
    ServiceDiscovery,
    /// Notification enable has been requested.
    Subscribing,
    /// Notifications are flowing.
    Streaming,
    /// The link is gone.
    Disconnected,
}

impl ConnectionState {
    /// Check if the link is up.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::ServiceDiscovery | Self::Subscribing | Self::Streaming
        )
    }

    /// Check if inbound data frames are processed in this state.
    pub fn accepts_frames(&self) -> bool {
        matches!(self, Self::Subscribing | Self::Streaming)
    }

    /// Check if the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::ServiceDiscovery => write!(f, "ServiceDiscovery"),
            Self::Subscribing => write!(f, "Subscribing"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

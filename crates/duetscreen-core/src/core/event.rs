//! Connectivity events
//!
//! Provides:
//! - The connectivity status reported by the WiFi provider
//! - Events the provider publishes when the link changes
//! - A dispatcher fanning events out to the poller and any UI indicator

use tokio::sync::broadcast;

/// Connectivity status of the WiFi link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Unknown,
    Connecting,
    Connected,
    Failed,
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Unknown => write!(f, "unknown"),
            Connectivity::Connecting => write!(f, "connecting"),
            Connectivity::Connected => write!(f, "connected"),
            Connectivity::Failed => write!(f, "failed"),
        }
    }
}

/// Link change published by the connectivity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// Association started
    Connecting,
    /// Station associated with the access point
    LinkUp,
    /// DHCP lease obtained
    IpAcquired(String),
    /// Association gave up
    AssociationFailed,
    /// Link dropped after being up
    LinkDown,
}

impl ConnectivityEvent {
    /// Status an indicator should show after this event
    pub fn status(&self) -> Connectivity {
        match self {
            ConnectivityEvent::Connecting => Connectivity::Connecting,
            ConnectivityEvent::LinkUp | ConnectivityEvent::IpAcquired(_) => {
                Connectivity::Connected
            }
            ConnectivityEvent::AssociationFailed => Connectivity::Failed,
            ConnectivityEvent::LinkDown => Connectivity::Unknown,
        }
    }
}

impl std::fmt::Display for ConnectivityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityEvent::Connecting => write!(f, "WiFi connecting"),
            ConnectivityEvent::LinkUp => write!(f, "WiFi link up"),
            ConnectivityEvent::IpAcquired(ip) => write!(f, "WiFi got IP {}", ip),
            ConnectivityEvent::AssociationFailed => write!(f, "WiFi association failed"),
            ConnectivityEvent::LinkDown => write!(f, "WiFi link down"),
        }
    }
}

/// Event dispatcher for publishing connectivity events to subscribers
#[derive(Clone)]
pub struct ConnectivityDispatcher {
    /// Broadcast sender channel for connectivity events.
    tx: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 16)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received it; publishing with no
    /// subscriber is not an error for the provider.
    pub fn publish(&self, event: ConnectivityEvent) -> usize {
        tracing::debug!("connectivity: {}", event);
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ConnectivityDispatcher {
    fn default() -> Self {
        Self::new(16)
    }
}

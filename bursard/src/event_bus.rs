//! Event bus for notification fan-out.
//!
//! Core events are published here after a state transition commits;
//! subscribers are the external collaborators (UI push, email/SMS
//! dispatch). Delivery is fire-and-forget: a send with no receivers or
//! a lagging receiver never affects the ledger.
//!
//! Uses tokio broadcast channels for fan-out to multiple receivers.

use bursar_domain::CoreEvent;
use bursar_engine::NotificationPort;
use std::sync::Arc;
use tokio::sync::broadcast;

// =============================================================================
// Event Bus
// =============================================================================

/// Broadcast bus carrying core events to notification consumers.
///
/// Multiple producers can send events, and multiple consumers can
/// receive. Uses broadcast channels for fan-out pattern.
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity.
    ///
    /// Capacity determines how many events can be buffered before
    /// slow receivers start missing events (lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// Returns 0 if there are no active receivers.
    pub fn send(&self, event: CoreEvent) -> usize {
        // send() returns Err if there are no receivers, but we don't care
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events.
    ///
    /// Returns a receiver that will receive all events sent after
    /// subscription.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Receiver for core events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<CoreEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the sender has been dropped.
    /// Returns error description if the receiver lagged (missed events).
    pub async fn recv(&mut self) -> Option<Result<CoreEvent, String>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            }
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, String>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            }
        }
    }
}

// =============================================================================
// Notification adapter
// =============================================================================

/// Notification sink backed by the event bus.
pub struct BusNotifier {
    bus: Arc<EventBus>,
}

impl BusNotifier {
    /// Create a notifier publishing to the given bus.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl NotificationPort for BusNotifier {
    fn notify(&self, event: CoreEvent) {
        let receivers = self.bus.send(event);
        tracing::debug!(receivers, "core event published");
    }
}

// =============================================================================
// Tests
// =============================================================================

//! "Cart updated" notification bus.
//!
//! The surrounding cart UI fires [`CartUpdated`] whenever it changes the cart.
//! The event carries no payload; it only tells subscribers to look again.

use tokio::sync::broadcast;

/// Notifications buffered per subscriber before older ones are dropped.
const DEFAULT_CAPACITY: usize = 64;

/// The cart was changed by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartUpdated;

/// Broadcast channel for [`CartUpdated`] notifications.
///
/// Cheap to clone; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct CartEvents {
    sender: broadcast::Sender<CartUpdated>,
}

impl CartEvents {
    /// Create a bus with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering `capacity` notifications per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire a notification. Returns how many subscribers will see it.
    pub fn notify(&self) -> usize {
        self.sender.send(CartUpdated).unwrap_or(0)
    }

    /// Subscribe to future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartUpdated> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for CartEvents {
    fn default() -> Self {
        Self::new()
    }
}

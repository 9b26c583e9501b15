//! # Peer Event Subscriber
//!
//! Receiving side of a peer group's connect/disconnect notifications.

use crate::messages::PeerEvent;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The peer group was dropped.
    #[error("Peer group closed")]
    Closed,
}

/// A subscription to peer membership events.
///
/// Events published before the subscription was created are not replayed.
pub struct PeerEvents {
    receiver: broadcast::Receiver<PeerEvent>,
}

impl PeerEvents {
    pub(crate) fn new(receiver: broadcast::Receiver<PeerEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next peer event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next event
    /// - `None` - The peer group was dropped
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Peer event subscriber lagged, events dropped");
                    continue;
                }
            }
        }
    }

    /// Try to receive the next event without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available
    /// - `Ok(None)` - No event available
    /// - `Err(SubscriptionError::Closed)` - The peer group was dropped
    pub fn try_recv(&mut self) -> Result<Option<PeerEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    debug!(lagged = count, "Peer event subscriber lagged");
                    continue;
                }
            }
        }
    }
}

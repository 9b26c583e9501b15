//! Peer Listener - pushes the current filter to newly connected peers
//!
//! Runs as a background task for the lifetime of the manager. Holds only a
//! weak reference to the manager so the task ends once the manager is gone.

use std::sync::Weak;

use peer_bus::{PeerEvent, PeerEvents, PeerId, PeerInfo};
use tracing::{debug, info, warn};

/// Reacts to peer membership changes
pub(crate) trait PeerJoinHandler: Send + Sync {
    /// A peer finished connecting.
    fn peer_joined(&self, peer: &PeerInfo);

    /// A peer went away.
    fn peer_left(&self, id: PeerId) {
        debug!(peer = %id, "Peer left");
    }
}

/// Standing subscription to a peer group's membership events
pub(crate) struct PeerListener {
    events: PeerEvents,
    handler: Weak<dyn PeerJoinHandler>,
}

impl PeerListener {
    pub(crate) fn new(events: PeerEvents, handler: Weak<dyn PeerJoinHandler>) -> Self {
        Self { events, handler }
    }

    /// Start listening for peer events
    ///
    /// This should be spawned as a background task.
    pub(crate) async fn run(mut self) {
        info!("[PeerListener] Started listening for peer events");

        loop {
            match self.events.recv().await {
                Some(event) => {
                    let Some(handler) = self.handler.upgrade() else {
                        debug!("[PeerListener] Filter manager dropped, shutting down");
                        break;
                    };
                    match event {
                        PeerEvent::Connected(info) => handler.peer_joined(&info),
                        PeerEvent::Disconnected(id) => handler.peer_left(id),
                    }
                }
                None => {
                    warn!("[PeerListener] Peer event stream ended, shutting down");
                    break;
                }
            }
        }
    }
}

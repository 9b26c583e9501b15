//! # Peer Group
//!
//! The sending side: deliver messages to connected peers and announce
//! membership changes.

use crate::messages::{Delivery, PeerEvent, PeerId, PeerInfo, PeerMessage};
use crate::subscriber::PeerEvents;
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// A set of remote peers that can be messaged as a group or one at a time.
pub trait PeerGroup: Send + Sync {
    /// Deliver a message.
    ///
    /// # Returns
    ///
    /// The number of peers the message was handed to.
    fn send(&self, message: PeerMessage, delivery: Delivery) -> usize;

    /// Subscribe to connect/disconnect events from now on.
    fn peer_events(&self) -> PeerEvents;
}

struct ConnectedPeer {
    info: PeerInfo,
    outbound: mpsc::UnboundedSender<PeerMessage>,
}

/// In-process peer group.
///
/// Each peer is represented by an unbounded inbox; tests and embedders read
/// what a real transport would have written to the socket.
pub struct InMemoryPeerGroup {
    peers: RwLock<BTreeMap<PeerId, ConnectedPeer>>,
    events: broadcast::Sender<PeerEvent>,
    next_id: AtomicU64,
    messages_sent: AtomicU64,
}

impl InMemoryPeerGroup {
    /// Create an empty group with default event capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an empty group with the given event channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            peers: RwLock::new(BTreeMap::new()),
            events,
            next_id: AtomicU64::new(1),
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Register a new peer and announce it to subscribers.
    pub fn connect(&self, remote_addr: impl Into<String>) -> PeerHandle {
        let id = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let info = PeerInfo {
            id,
            remote_addr: remote_addr.into(),
        };
        let (outbound, inbox) = mpsc::unbounded_channel();

        if let Ok(mut peers) = self.peers.write() {
            peers.insert(
                id,
                ConnectedPeer {
                    info: info.clone(),
                    outbound,
                },
            );
        }

        let receivers = self.events.send(PeerEvent::Connected(info.clone())).unwrap_or(0);
        debug!(peer = %id, remote_addr = %info.remote_addr, receivers, "Peer connected");

        PeerHandle { info, inbox }
    }

    /// Remove a peer. Returns `false` if it was not connected.
    pub fn disconnect(&self, id: PeerId) -> bool {
        let removed = self
            .peers
            .write()
            .map(|mut peers| peers.remove(&id).is_some())
            .unwrap_or(false);

        if removed {
            let _ = self.events.send(PeerEvent::Disconnected(id));
            debug!(peer = %id, "Peer disconnected");
        }
        removed
    }

    /// Currently connected peers, ordered by id.
    pub fn connected_peers(&self) -> Vec<PeerInfo> {
        self.peers
            .read()
            .map(|peers| peers.values().map(|peer| peer.info.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.read().map(|peers| peers.len()).unwrap_or(0)
    }

    /// Total messages handed to peers.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryPeerGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerGroup for InMemoryPeerGroup {
    fn send(&self, message: PeerMessage, delivery: Delivery) -> usize {
        let Ok(peers) = self.peers.read() else {
            return 0;
        };

        let mut delivered = 0;
        let mut deliver = |peer: &ConnectedPeer| {
            if peer.outbound.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                // Handle dropped without disconnecting; the peer is unreachable.
                warn!(peer = %peer.info.id, command = message.command(), "Peer inbox closed");
            }
        };

        match delivery {
            Delivery::AllPeers => peers.values().for_each(&mut deliver),
            Delivery::Peer(id) => match peers.get(&id) {
                Some(peer) => deliver(peer),
                None => debug!(peer = %id, command = message.command(), "Unknown peer"),
            },
        }

        self.messages_sent
            .fetch_add(delivered as u64, Ordering::Relaxed);
        debug!(command = message.command(), delivered, "Message sent");
        delivered
    }

    fn peer_events(&self) -> PeerEvents {
        PeerEvents::new(self.events.subscribe())
    }
}

/// The receiving end of one peer's inbox.
pub struct PeerHandle {
    info: PeerInfo,
    inbox: mpsc::UnboundedReceiver<PeerMessage>,
}

impl PeerHandle {
    /// Group-assigned identifier.
    pub fn id(&self) -> PeerId {
        self.info.id
    }

    /// Peer description.
    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    /// Wait for the next message. `None` once the peer was disconnected and
    /// the inbox is drained.
    pub async fn recv(&mut self) -> Option<PeerMessage> {
        self.inbox.recv().await
    }

    /// Next message if one is queued.
    pub fn try_recv(&mut self) -> Option<PeerMessage> {
        self.inbox.try_recv().ok()
    }

    /// Every queued message, oldest first.
    pub fn drain(&mut self) -> Vec<PeerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            messages.push(message);
        }
        messages
    }
}

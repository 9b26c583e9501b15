//! # Peer Bus - Message Delivery to Connected Peers
//!
//! The transport side of filter management. A filter manager never talks to
//! sockets directly; it hands `filterload` / `filteradd` messages to a
//! [`PeerGroup`] and listens for peer connections on a [`PeerEvents`] stream.
//!
//! ```text
//! ┌────────────────┐   send(msg, Delivery)   ┌──────────────┐
//! │ Filter Manager │ ──────────────────────▶ │  Peer Group  │ ──▶ peer inboxes
//! │                │ ◀────────────────────── │              │
//! └────────────────┘   PeerEvent::Connected  └──────────────┘
//! ```
//!
//! [`InMemoryPeerGroup`] is the in-process implementation: each connected
//! peer gets an unbounded inbox ([`PeerHandle`]) and connect/disconnect
//! notifications fan out over a `tokio::sync::broadcast` channel.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod group;
pub mod messages;
pub mod subscriber;

// Re-export main types
pub use group::{InMemoryPeerGroup, PeerGroup, PeerHandle};
pub use messages::{
    BloomFlags, Delivery, FilterAdd, FilterLoad, PeerEvent, PeerId, PeerInfo, PeerMessage,
};
pub use subscriber::{PeerEvents, SubscriptionError};

/// Maximum peer events buffered per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

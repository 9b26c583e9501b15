//! # Peer Messages
//!
//! Payload shapes exchanged with remote peers and the events a peer group
//! reports. Only the filter commands of BIP37 are modelled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a peer by its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A connected peer as seen by the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Group-assigned identifier.
    pub id: PeerId,
    /// Remote socket address, for logging.
    pub remote_addr: String,
}

/// BIP37 `nFlags`: how matched outputs update the remote filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloomFlags {
    /// Never update the filter on match.
    #[default]
    None,
    /// Add the outpoint of every matched output.
    All,
    /// Add outpoints only for pay-to-pubkey / multisig outputs.
    PubKeyOnly,
}

impl BloomFlags {
    /// Wire value of the flag.
    pub fn as_u8(self) -> u8 {
        match self {
            BloomFlags::None => 0,
            BloomFlags::All => 1,
            BloomFlags::PubKeyOnly => 2,
        }
    }

    /// Parse a wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BloomFlags::None),
            1 => Some(BloomFlags::All),
            2 => Some(BloomFlags::PubKeyOnly),
            _ => None,
        }
    }
}

/// Full filter payload (`filterload`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLoad {
    /// Serialized bit array, LSB-first within each byte.
    pub data: Vec<u8>,
    /// Number of hash functions.
    pub hash_funcs: u32,
    /// Random seed mixed into every hash function.
    pub tweak: u32,
    /// Update behaviour on match.
    pub flags: BloomFlags,
}

impl FilterLoad {
    /// Filter size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Single element payload (`filteradd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterAdd {
    /// Raw element bytes.
    pub data: Vec<u8>,
}

/// Messages a filter manager sends to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Replace the peer's filter.
    FilterLoad(FilterLoad),
    /// Add one element to the peer's filter.
    FilterAdd(FilterAdd),
}

impl PeerMessage {
    /// Protocol command name.
    pub fn command(&self) -> &'static str {
        match self {
            PeerMessage::FilterLoad(_) => "filterload",
            PeerMessage::FilterAdd(_) => "filteradd",
        }
    }
}

/// Who should receive a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every currently connected peer.
    AllPeers,
    /// A single peer.
    Peer(PeerId),
}

/// Membership changes reported by a peer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A peer finished connecting.
    Connected(PeerInfo),
    /// A peer went away.
    Disconnected(PeerId),
}

//! Adapters Layer - connections to the peer group

pub(crate) mod peer_listener;

//! # SPV Filter
//!
//! Bloom filter lifecycle management for light clients (BIP37).
//!
//! A light client tells its peers which transactions it cares about by
//! loading a Bloom filter onto them. This crate owns that filter: it
//! collects elements, keeps the filter sized for a target false positive
//! rate, and keeps every connected peer in sync with `filterload` /
//! `filteradd` messages.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure business logic, no I/O
//!   - `BloomFilter`: BIP37 Bloom filter
//!   - `parameters`: sizing math and the resize rule
//!   - `FilterConfig` / `FilterConfigBuilder`: configuration with validation
//!   - `ElementStore`, `FilterableRegistry`, `Lifecycle`
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `FilterManagerApi`: Driving port (inbound API)
//!   - `Filterable`: Driven port (dynamic element sources)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `FilterManager`: implements `FilterManagerApi`
//!
//! - **Events Layer** (`events/`): `FilterEvent` signals
//!
//! - **Adapters Layer** (`adapters/`): peer listener pushing the filter to
//!   newly connected peers
//!
//! ## Invariants
//!
//! - **No false negatives**: every added element stays in every filter
//!   built afterwards
//! - **Counter**: `insertion_count()` is the number of insertions into the
//!   current filter since it was built
//! - **Resize rule**: rebuild when `estimate - target >= threshold * target`,
//!   with the estimate computed for at least 100 elements
//!
//! ## Usage Example
//!
//! ```ignore
//! use peer_bus::InMemoryPeerGroup;
//! use spv_filter::{FilterConfigBuilder, FilterManager};
//! use std::sync::Arc;
//!
//! let peers = Arc::new(InMemoryPeerGroup::new());
//! let config = FilterConfigBuilder::new().false_positive_rate(0.0001).build()?;
//! let manager = FilterManager::new(peers.clone(), config)?;
//!
//! let mut events = manager.subscribe();
//! manager.wait_ready().await;
//!
//! manager.add(script_pubkey.as_slice()).await?;
//! manager.add(Arc::new(wallet)).await?;
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub(crate) mod adapters;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use domain::{BloomFilter, FilterConfig, FilterConfigBuilder, Lifecycle};
pub use error::{FilterError, FilterableError, MAX_ELEMENT_SIZE};
pub use events::FilterEvent;
pub use metrics::{FilterMetrics, MetricsSnapshot};
pub use ports::{
    Completion, ElementBatch, ElementSink, FilterInput, FilterManagerApi, Filterable, Resolution,
    SinkSubscription,
};
pub use service::FilterManager;

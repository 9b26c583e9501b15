//! Ports Layer - Hexagonal Architecture interfaces
//!
//! Inbound ports: the API callers drive the manager through.
//! Outbound ports: the element sources the manager is driven by.

pub mod inbound;
pub mod outbound;

pub use inbound::{FilterInput, FilterManagerApi};
pub use outbound::{Completion, ElementBatch, ElementSink, Filterable, Resolution, SinkSubscription};

//! Inbound Ports (Driving Ports)
//!
//! The API callers use to feed the filter manager.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FilterError;
use crate::ports::outbound::Filterable;

/// Something that can be added to the filter
#[derive(Clone)]
pub enum FilterInput {
    /// A raw element, copied and retained for replay.
    Element(Vec<u8>),
    /// A dynamic element source.
    Filterable(Arc<dyn Filterable>),
}

impl From<Vec<u8>> for FilterInput {
    fn from(bytes: Vec<u8>) -> Self {
        FilterInput::Element(bytes)
    }
}

impl From<&[u8]> for FilterInput {
    fn from(bytes: &[u8]) -> Self {
        FilterInput::Element(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for FilterInput {
    fn from(bytes: &[u8; N]) -> Self {
        FilterInput::Element(bytes.to_vec())
    }
}

impl<T: Filterable + 'static> From<Arc<T>> for FilterInput {
    fn from(filterable: Arc<T>) -> Self {
        FilterInput::Filterable(filterable)
    }
}

impl std::fmt::Debug for FilterInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterInput::Element(bytes) => f.debug_tuple("Element").field(&hex::encode(bytes)).finish(),
            FilterInput::Filterable(_) => f.write_str("Filterable(..)"),
        }
    }
}

/// Primary filter manager API (Driving Port)
#[async_trait]
pub trait FilterManagerApi: Send + Sync {
    /// Add a static element or a filterable, then resize if the false
    /// positive estimate drifted past the threshold.
    async fn add(&self, input: FilterInput) -> Result<(), FilterError>;

    /// Always fails: elements cannot be removed from a Bloom filter.
    fn remove(&self, element: &[u8]) -> Result<(), FilterError>;

    /// Rebuild the filter from every retained element and push it to peers.
    async fn resize(&self) -> Result<(), FilterError>;

    /// Resolve once the first filter is built and announced.
    async fn wait_ready(&self);

    /// Insertions into the current filter since it was built.
    fn insertion_count(&self) -> usize;
}

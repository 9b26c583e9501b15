//! Domain Layer - Pure business logic
//!
//! This layer contains:
//! - BIP37 Bloom filter and its hash functions
//! - Parameter calculations and the resize rule
//! - Configuration
//! - Element store, filterable registry and lifecycle state
//!
//! RULES:
//! - No I/O operations
//! - No async code

pub mod bloom_filter;
pub mod config;
pub mod element_store;
pub mod hash_functions;
pub mod lifecycle;
pub mod parameters;
pub mod registry;

pub use bloom_filter::BloomFilter;
pub use config::{FilterConfig, FilterConfigBuilder};
pub use element_store::ElementStore;
pub use lifecycle::Lifecycle;
pub use parameters::{bip37_parameters, BloomFilterParams, MIN_ESTIMATE_ELEMENTS};
pub use registry::FilterableRegistry;

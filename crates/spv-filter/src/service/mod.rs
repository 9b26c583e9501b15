//! Service Layer - Filter lifecycle orchestration

pub mod filter_manager;
pub(crate) mod resolver;

pub use filter_manager::FilterManager;

//! Error types for the filter manager

use thiserror::Error;

/// Largest element accepted from a filterable batch (BIP37 `MAX_SCRIPT_ELEMENT_SIZE`).
pub const MAX_ELEMENT_SIZE: usize = 520;

/// Errors that can occur while managing the filter
///
/// `Clone` so errors can be fanned out on the manager's event channel.
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    #[error("Invalid false positive rate: {fpr} (must be between 0 and 1, exclusive)")]
    InvalidFPR { fpr: f64 },

    #[error("Invalid filter parameters: {0}")]
    InvalidParameters(String),

    #[error("Filter manager must be created inside a Tokio runtime")]
    NoRuntime,

    #[error("\"filter_elements()\" must return a list of byte elements (each at most {max} bytes) or none: {reason}")]
    InvalidElements { reason: String, max: usize },

    #[error("Element is {size} bytes, larger than the {max} bytes a filteradd carries")]
    ElementTooLarge { size: usize, max: usize },

    #[error("Filterable::filter_elements() returned elements via both the completion handle and an immediate return")]
    ProtocolViolation,

    #[error(transparent)]
    Filterable(#[from] FilterableError),

    #[error("Filterable dropped its completion handle without completing")]
    CompletionDropped,

    #[error("Removing elements from the filter is not supported")]
    RemoveUnsupported,
}

/// Failure reported by a filterable while producing its elements
///
/// Displays as the filterable's own message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FilterableError {
    message: String,
}

impl FilterableError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

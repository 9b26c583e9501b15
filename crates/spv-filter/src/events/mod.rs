//! Events Layer - Manager signals
//!
//! Observers subscribe to a broadcast of [`FilterEvent`]s. `Initialized`
//! and `Ready` fire exactly once each, in that order; errors that have no
//! caller to return to arrive as `Error`.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;

use crate::error::FilterError;
use crate::metrics::FilterMetrics;

/// Signals emitted by the filter manager
#[derive(Clone, Debug)]
pub enum FilterEvent {
    /// The first filter was built.
    Initialized,
    /// Startup finished; `once_ready` callbacks have been released.
    Ready,
    /// A new filter replaced the live one and was pushed to peers.
    Resized {
        /// Element count the filter was sized for
        capacity: usize,
        size_bytes: usize,
        hash_funcs: u32,
    },
    /// A failure with no caller to return it to.
    Error(FilterError),
}

impl FilterEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, FilterEvent::Error(_))
    }
}

/// Sending side of the event broadcast
#[derive(Clone)]
pub(crate) struct Signals {
    sender: broadcast::Sender<FilterEvent>,
    metrics: Arc<FilterMetrics>,
}

impl Signals {
    pub(crate) fn new(capacity: usize, metrics: Arc<FilterMetrics>) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, metrics }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<FilterEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: FilterEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    /// Log and broadcast an error.
    pub(crate) fn error(&self, error: FilterError) {
        warn!(error = %error, "Filter manager error");
        self.metrics.record_error();
        self.emit(FilterEvent::Error(error));
    }
}

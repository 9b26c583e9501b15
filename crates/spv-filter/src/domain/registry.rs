//! Registered filterables
//!
//! Each registration pairs the filterable with the subscription that keeps
//! its emission sink alive, for as long as it stays registered.

use std::sync::Arc;

use crate::ports::outbound::{Filterable, SinkSubscription};

struct Registration {
    filterable: Arc<dyn Filterable>,
    _subscription: SinkSubscription,
}

/// Ordered registry of dynamic element sources
#[derive(Default)]
pub struct FilterableRegistry {
    registrations: Vec<Registration>,
}

impl FilterableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filterable along with its sink subscription.
    pub fn register(&mut self, filterable: Arc<dyn Filterable>, subscription: SinkSubscription) {
        self.registrations.push(Registration {
            filterable,
            _subscription: subscription,
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Snapshot of registered filterables in registration order
    pub fn filterables(&self) -> Vec<Arc<dyn Filterable>> {
        self.registrations
            .iter()
            .map(|registration| registration.filterable.clone())
            .collect()
    }
}

impl std::fmt::Debug for FilterableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterableRegistry")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

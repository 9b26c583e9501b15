//! Manager lifecycle: `Uninitialized → Initializing → Ready`

use serde::Serialize;

/// Where the manager is in its one-way startup sequence
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Lifecycle {
    /// Constructed; the startup task has not run yet.
    #[default]
    Uninitialized,
    /// Building the first filter.
    Initializing,
    /// First filter built and announced.
    Ready,
}

impl Lifecycle {
    /// Filterables are resolved on add from `Initializing` onwards.
    pub fn is_initialized(self) -> bool {
        self != Lifecycle::Uninitialized
    }

    pub fn is_ready(self) -> bool {
        self == Lifecycle::Ready
    }
}

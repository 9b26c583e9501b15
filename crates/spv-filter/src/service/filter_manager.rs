//! Filter Manager
//!
//! Owns the live Bloom filter shared with a peer group and keeps it sized
//! for its target false positive rate.
//!
//! ## Lifecycle
//!
//! Construction spawns the startup task and returns immediately, so callers
//! can subscribe to events before anything fires. The startup task builds
//! the first filter, starts pushing it to newly connected peers, then
//! signals `Initialized` and `Ready`.
//!
//! ## Locking
//!
//! `state` is a plain mutex and is never held across an `.await`. Resizes
//! and filterable registration are serialized by the async `rebuild` mutex.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use futures::future::try_join_all;
use peer_bus::{Delivery, FilterAdd, FilterLoad, PeerGroup, PeerInfo, PeerMessage};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::peer_listener::{PeerJoinHandler, PeerListener};
use crate::domain::parameters::{exceeds_threshold, MIN_ESTIMATE_ELEMENTS};
use crate::domain::{BloomFilter, ElementStore, FilterConfig, FilterableRegistry, Lifecycle};
use crate::error::{FilterError, MAX_ELEMENT_SIZE};
use crate::events::{FilterEvent, Signals};
use crate::metrics::FilterMetrics;
use crate::ports::outbound::{ElementSink, EmissionTarget, Filterable};
use crate::ports::{FilterInput, FilterManagerApi};
use crate::service::resolver::resolve_initial;

/// Manages the Bloom filter a light client shares with its peers
///
/// Cheap to clone; clones share the same filter.
pub struct FilterManager<P: PeerGroup + 'static> {
    inner: Arc<Inner<P>>,
}

impl<P: PeerGroup + 'static> Clone for FilterManager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<P> {
    peers: Arc<P>,
    config: FilterConfig,
    state: Mutex<FilterState>,
    rebuild: tokio::sync::Mutex<()>,
    lifecycle: watch::Sender<Lifecycle>,
    signals: Signals,
    metrics: Arc<FilterMetrics>,
    runtime: Handle,
}

#[derive(Default)]
struct FilterState {
    /// Absent until the first resize
    filter: Option<BloomFilter>,
    elements: ElementStore,
    registry: FilterableRegistry,
}

impl<P: PeerGroup + 'static> FilterManager<P> {
    /// Create a manager for `peers` and schedule its startup.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(peers: Arc<P>, config: FilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| FilterError::NoRuntime)?;

        let metrics = Arc::new(FilterMetrics::new());
        let signals = Signals::new(config.event_capacity, metrics.clone());
        let (lifecycle, _) = watch::channel(Lifecycle::Uninitialized);

        info!(
            fpr = config.false_positive_rate,
            resize_threshold = config.resize_threshold,
            "Creating filter manager"
        );

        let manager = Self {
            inner: Arc::new(Inner {
                peers,
                config,
                state: Mutex::new(FilterState::default()),
                rebuild: tokio::sync::Mutex::new(()),
                lifecycle,
                signals,
                metrics,
                runtime,
            }),
        };

        let startup = manager.clone();
        manager.inner.runtime.spawn(async move { startup.initialize().await });

        Ok(manager)
    }

    async fn initialize(&self) {
        self.inner.lifecycle.send_replace(Lifecycle::Initializing);

        // Subscribe before the first build so no peer falls between the
        // initial broadcast and the listener.
        let events = self.inner.peers.peer_events();

        if let Err(error) = self.resize().await {
            self.inner.signals.error(error);
        } else if let Err(error) = self.maybe_resize().await {
            // Filterables registered before startup only count once resolved.
            self.inner.signals.error(error);
        }

        let handler: Weak<dyn PeerJoinHandler> = Arc::downgrade(&self.inner) as Weak<dyn PeerJoinHandler>;
        self.inner
            .runtime
            .spawn(PeerListener::new(events, handler).run());

        self.inner.signals.emit(FilterEvent::Initialized);
        self.inner.lifecycle.send_replace(Lifecycle::Ready);
        self.inner.signals.emit(FilterEvent::Ready);
        info!(
            elements = self.element_count(),
            filterables = self.filterable_count(),
            "Filter manager ready"
        );
    }

    /// Add a static element or a filterable
    ///
    /// Static elements are copied, inserted into the live filter and sent to
    /// peers as a `filteradd`. Filterables are resolved, registered, and
    /// their initial elements inserted without `filteradd`s. Either way the
    /// filter is rebuilt afterwards if its estimate drifted past the
    /// threshold.
    pub async fn add(&self, input: impl Into<FilterInput>) -> Result<(), FilterError> {
        match input.into() {
            FilterInput::Element(element) => {
                if element.len() > MAX_ELEMENT_SIZE {
                    return Err(FilterError::ElementTooLarge {
                        size: element.len(),
                        max: MAX_ELEMENT_SIZE,
                    });
                }
                self.inner.add_element(&element)
            }
            FilterInput::Filterable(filterable) => self.add_filterable(filterable).await?,
        }
        self.maybe_resize().await
    }

    /// Run [`add`](Self::add) in the background, reporting failures as
    /// [`FilterEvent::Error`].
    pub fn spawn_add(&self, input: impl Into<FilterInput>) -> JoinHandle<()> {
        let manager = self.clone();
        let input = input.into();
        self.inner.runtime.spawn(async move {
            if let Err(error) = manager.add(input).await {
                manager.inner.signals.error(error);
            }
        })
    }

    /// Always fails: elements cannot be removed from a Bloom filter.
    pub fn remove(&self, element: &[u8]) -> Result<(), FilterError> {
        warn!(element = %hex::encode(element), "Removal requested but not supported");
        Err(FilterError::RemoveUnsupported)
    }

    /// Rebuild the filter from every retained element and push it to all peers
    ///
    /// On failure the live filter is left untouched.
    pub async fn resize(&self) -> Result<(), FilterError> {
        let _rebuild = self.inner.rebuild.lock().await;
        self.rebuild_locked().await
    }

    /// Invoke `callback` once the manager is ready, immediately if it already is.
    pub fn once_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.lifecycle().is_ready() {
            callback();
            return;
        }

        let mut lifecycle = self.inner.lifecycle.subscribe();
        self.inner.runtime.spawn(async move {
            if lifecycle.wait_for(|state| state.is_ready()).await.is_ok() {
                callback();
            }
        });
    }

    /// Wait until the manager is ready.
    pub async fn wait_ready(&self) {
        let mut lifecycle = self.inner.lifecycle.subscribe();
        if lifecycle.wait_for(|state| state.is_ready()).await.is_err() {
            warn!("Filter manager dropped before becoming ready");
        }
    }

    /// Subscribe to manager events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FilterEvent> {
        self.inner.signals.subscribe()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.borrow()
    }

    /// Insertions into the current filter since it was built
    pub fn insertion_count(&self) -> usize {
        self.inner
            .lock_state()
            .filter
            .as_ref()
            .map_or(0, BloomFilter::elements_inserted)
    }

    /// Number of registered filterables
    pub fn filterable_count(&self) -> usize {
        self.inner.lock_state().registry.len()
    }

    /// Number of retained static elements
    pub fn element_count(&self) -> usize {
        self.inner.lock_state().elements.len()
    }

    /// Estimated false positive rate of the live filter
    pub fn estimated_false_positive_rate(&self) -> Option<f64> {
        self.inner
            .lock_state()
            .filter
            .as_ref()
            .map(BloomFilter::estimated_false_positive_rate)
    }

    /// Test the live filter for `element`; `false` before the first build.
    pub fn contains(&self, element: &[u8]) -> bool {
        self.inner
            .lock_state()
            .filter
            .as_ref()
            .is_some_and(|filter| filter.contains(element))
    }

    /// The `filterload` payload of the live filter
    pub fn filter_payload(&self) -> Option<FilterLoad> {
        self.inner
            .lock_state()
            .filter
            .as_ref()
            .map(BloomFilter::to_payload)
    }

    pub fn config(&self) -> &FilterConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &FilterMetrics {
        &self.inner.metrics
    }

    async fn add_filterable(&self, filterable: Arc<dyn Filterable>) -> Result<(), FilterError> {
        let _rebuild = self.inner.rebuild.lock().await;

        // Before startup the first build resolves every registered filterable.
        let elements = if self.lifecycle().is_initialized() {
            resolve_initial(filterable.as_ref(), &self.inner.signals, &self.inner.runtime).await?
        } else {
            Vec::new()
        };

        let target: Weak<dyn EmissionTarget> = Arc::downgrade(&self.inner) as Weak<dyn EmissionTarget>;
        let (sink, subscription) = ElementSink::new(target);

        let inserted = {
            let mut state = self.inner.lock_state();
            state.registry.register(filterable.clone(), subscription);
            match state.filter.as_mut() {
                Some(filter) => {
                    elements.iter().for_each(|element| filter.insert(element));
                    elements.len()
                }
                None => 0,
            }
        };

        self.inner.metrics.record_filterable();
        self.inner.metrics.record_inserts(inserted);
        debug!(
            resolved = elements.len(),
            inserted,
            insertions = self.insertion_count(),
            "Registered filterable"
        );

        filterable.subscribe(sink);
        Ok(())
    }

    async fn maybe_resize(&self) -> Result<(), FilterError> {
        if !self.inner.needs_resize() {
            return Ok(());
        }

        let _rebuild = self.inner.rebuild.lock().await;
        // A resize that held the lock may already have fixed it.
        if !self.inner.needs_resize() {
            return Ok(());
        }
        self.rebuild_locked().await
    }

    /// Build a replacement filter and swap it in. Caller holds `rebuild`.
    async fn rebuild_locked(&self) -> Result<(), FilterError> {
        let inner = &self.inner;
        let config = &inner.config;

        let (mut filter, capacity, replayed, filterables) = {
            let state = inner.lock_state();
            // The first build sizes for the static elements retained so far.
            let capacity = state
                .filter
                .as_ref()
                .map_or(state.elements.len(), BloomFilter::elements_inserted)
                .max(MIN_ESTIMATE_ELEMENTS);

            let mut filter = BloomFilter::for_capacity(
                capacity,
                config.false_positive_rate,
                rand::random(),
                config.flags,
            );
            state.elements.iter().for_each(|element| filter.insert(element));

            (filter, capacity, state.elements.len(), state.registry.filterables())
        };

        let batches = if self.lifecycle().is_initialized() {
            try_join_all(
                filterables
                    .iter()
                    .map(|filterable| resolve_initial(filterable.as_ref(), &inner.signals, &inner.runtime)),
            )
            .await
        } else {
            Ok(Vec::new())
        };

        let batches = match batches {
            Ok(batches) => batches,
            Err(error) => {
                inner.metrics.record_resize_failed();
                warn!(error = %error, capacity, "Resize aborted, keeping current filter");
                return Err(error);
            }
        };

        let payload = {
            let mut state = inner.lock_state();
            // Static elements added while filterables were resolving.
            state.elements.since(replayed).for_each(|element| filter.insert(element));
            batches.iter().flatten().for_each(|element| filter.insert(element));

            let payload = filter.to_payload();
            inner.metrics.record_inserts(filter.elements_inserted());
            state.filter = Some(filter);
            payload
        };

        let size_bytes = payload.size();
        let hash_funcs = payload.hash_funcs;
        info!(
            capacity,
            size_bytes,
            hash_funcs,
            tweak = payload.tweak,
            "Filter resized"
        );

        inner.send_filterload(payload, Delivery::AllPeers);
        inner.metrics.record_resize(size_bytes);
        inner.signals.emit(FilterEvent::Resized {
            capacity,
            size_bytes,
            hash_funcs,
        });
        Ok(())
    }
}

#[async_trait]
impl<P: PeerGroup + 'static> FilterManagerApi for FilterManager<P> {
    async fn add(&self, input: FilterInput) -> Result<(), FilterError> {
        FilterManager::add(self, input).await
    }

    fn remove(&self, element: &[u8]) -> Result<(), FilterError> {
        FilterManager::remove(self, element)
    }

    async fn resize(&self) -> Result<(), FilterError> {
        FilterManager::resize(self).await
    }

    async fn wait_ready(&self) {
        FilterManager::wait_ready(self).await
    }

    fn insertion_count(&self) -> usize {
        FilterManager::insertion_count(self)
    }
}

impl<P: PeerGroup + 'static> Inner<P> {
    fn lock_state(&self) -> MutexGuard<'_, FilterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn needs_resize(&self) -> bool {
        let state = self.lock_state();
        state.filter.as_ref().is_some_and(|filter| {
            exceeds_threshold(
                filter.estimated_false_positive_rate(),
                self.config.false_positive_rate,
                self.config.resize_threshold,
            )
        })
    }

    fn add_element(&self, element: &[u8]) {
        let inserted = {
            let mut state = self.lock_state();
            let FilterState {
                filter, elements, ..
            } = &mut *state;
            let stored = elements.push(element);
            match filter {
                Some(filter) => {
                    filter.insert(stored);
                    true
                }
                None => false,
            }
        };

        if inserted {
            self.metrics.record_inserts(1);
            self.send_filteradd(element);
        } else {
            debug!(element = %hex::encode(element), "Element retained until the first filter is built");
        }
    }

    fn send_filteradd(&self, element: &[u8]) {
        let message = PeerMessage::FilterAdd(FilterAdd {
            data: element.to_vec(),
        });
        let delivered = self.peers.send(message, Delivery::AllPeers);
        self.metrics.record_filteradd();
        debug!(element = %hex::encode(element), delivered, "Sent filteradd");
    }

    fn send_filterload(&self, payload: FilterLoad, delivery: Delivery) {
        let size = payload.size();
        let delivered = self.peers.send(PeerMessage::FilterLoad(payload), delivery);
        self.metrics.record_filterload();
        debug!(size, ?delivery, delivered, "Sent filterload");
    }
}

impl<P: PeerGroup + 'static> PeerJoinHandler for Inner<P> {
    fn peer_joined(&self, peer: &PeerInfo) {
        let payload = self.lock_state().filter.as_ref().map(BloomFilter::to_payload);
        match payload {
            Some(payload) => {
                debug!(peer = %peer.id, remote_addr = %peer.remote_addr, "Pushing filter to new peer");
                self.send_filterload(payload, Delivery::Peer(peer.id));
            }
            None => debug!(peer = %peer.id, "Peer joined before the first filter was built"),
        }
    }
}

impl<P: PeerGroup + 'static> EmissionTarget for Inner<P> {
    fn receive(self: Arc<Self>, elements: Vec<Vec<u8>>) -> usize {
        let (accepted, rejected): (Vec<_>, Vec<_>) = elements
            .into_iter()
            .partition(|element| element.len() <= MAX_ELEMENT_SIZE);

        if let Some(oversized) = rejected.first() {
            self.signals.error(FilterError::InvalidElements {
                reason: format!(
                    "emitted element is {} bytes ({} dropped)",
                    oversized.len(),
                    rejected.len()
                ),
                max: MAX_ELEMENT_SIZE,
            });
        }

        let inserted = {
            let mut state = self.lock_state();
            match state.filter.as_mut() {
                Some(filter) => {
                    accepted.iter().for_each(|element| filter.insert(element));
                    true
                }
                None => false,
            }
        };

        if !inserted {
            debug!(count = accepted.len(), "Emission before the first filter, ignored");
            return 0;
        }

        self.metrics.record_inserts(accepted.len());
        accepted.iter().for_each(|element| self.send_filteradd(element));

        if self.needs_resize() {
            let manager = FilterManager { inner: self.clone() };
            self.runtime.spawn(async move {
                if let Err(error) = manager.maybe_resize().await {
                    manager.inner.signals.error(error);
                }
            });
        }

        accepted.len()
    }
}

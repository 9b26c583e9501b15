//! Outbound Ports (Driven Ports)
//!
//! Dynamic element sources. A [`Filterable`] answers once for its initial
//! elements and may keep emitting new ones through an [`ElementSink`] for
//! as long as it stays registered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::oneshot;

use crate::error::FilterableError;

/// Initial elements of a filterable; `None` means it has none.
pub type ElementBatch = Option<Vec<Vec<u8>>>;

/// Receiving end of a [`Completion`].
pub(crate) type CompletionReceiver = oneshot::Receiver<Result<ElementBatch, FilterableError>>;

/// How a filterable answered [`Filterable::filter_elements`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Answered immediately; the completion handle must not be used as well.
    Now(ElementBatch),
    /// The answer will arrive through the completion handle.
    Deferred,
}

/// Single-use handle for delivering initial elements later.
///
/// Consumed on use, so a filterable can complete at most once through it.
/// Dropping it after returning [`Resolution::Deferred`] fails the
/// resolution.
#[derive(Debug)]
pub struct Completion {
    sender: oneshot::Sender<Result<ElementBatch, FilterableError>>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, CompletionReceiver) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Deliver the outcome.
    pub fn complete(self, result: Result<ElementBatch, FilterableError>) {
        // The manager may have stopped waiting; nothing to report then.
        let _ = self.sender.send(result);
    }

    /// Deliver a batch of elements.
    pub fn elements(self, elements: Vec<Vec<u8>>) {
        self.complete(Ok(Some(elements)));
    }

    /// Deliver "no initial elements".
    pub fn none(self) {
        self.complete(Ok(None));
    }

    /// Report a failure.
    pub fn fail(self, message: impl Into<String>) {
        self.complete(Err(FilterableError::new(message)));
    }
}

/// A dynamic source of filter elements
///
/// Both methods have defaults so a source that only emits, or only has a
/// fixed initial set, implements just one of them.
pub trait Filterable: Send + Sync {
    /// Supply the initial elements, either immediately or via `completion`.
    ///
    /// Called once when the filterable is added and again on every resize.
    fn filter_elements(&self, completion: Completion) -> Resolution {
        drop(completion);
        Resolution::Now(None)
    }

    /// Receive the standing emission channel for this registration.
    fn subscribe(&self, sink: ElementSink) {
        let _ = sink;
    }
}

/// Receives emitted elements on behalf of a sink.
pub(crate) trait EmissionTarget: Send + Sync {
    /// Insert emitted elements, returning how many were accepted.
    fn receive(self: Arc<Self>, elements: Vec<Vec<u8>>) -> usize;
}

/// Emission capability handed to a registered filterable
///
/// Cheap to clone. Emissions are ignored once the manager is gone or the
/// registration's subscription was cancelled.
#[derive(Clone)]
pub struct ElementSink {
    target: Weak<dyn EmissionTarget>,
    active: Arc<AtomicBool>,
}

impl ElementSink {
    pub(crate) fn new(target: Weak<dyn EmissionTarget>) -> (Self, SinkSubscription) {
        let active = Arc::new(AtomicBool::new(true));
        let sink = Self {
            target,
            active: active.clone(),
        };
        (sink, SinkSubscription { active })
    }

    /// Emit a single element. Returns `true` if it was inserted.
    pub fn emit(&self, element: &[u8]) -> bool {
        self.deliver(vec![element.to_vec()]) == 1
    }

    /// Emit several elements at once. Returns how many were inserted.
    pub fn emit_all<I, E>(&self, elements: I) -> usize
    where
        I: IntoIterator<Item = E>,
        E: AsRef<[u8]>,
    {
        let batch: Vec<Vec<u8>> = elements.into_iter().map(|e| e.as_ref().to_vec()).collect();
        if batch.is_empty() {
            return 0;
        }
        self.deliver(batch)
    }

    /// Whether emissions are still forwarded.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.target.strong_count() > 0
    }

    fn deliver(&self, elements: Vec<Vec<u8>>) -> usize {
        if !self.active.load(Ordering::Acquire) {
            return 0;
        }
        match self.target.upgrade() {
            Some(target) => target.receive(elements),
            None => 0,
        }
    }
}

impl std::fmt::Debug for ElementSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementSink")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Keeps a sink forwarding; dropping it stops the sink.
#[derive(Debug)]
pub struct SinkSubscription {
    active: Arc<AtomicBool>,
}

impl SinkSubscription {
    /// Stop forwarding emissions.
    pub fn cancel(self) {}
}

impl Drop for SinkSubscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

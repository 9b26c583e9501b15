//! Shared fixtures for the integration flows

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use peer_bus::{FilterLoad, InMemoryPeerGroup, PeerHandle, PeerMessage};
use spv_filter::{
    Completion, ElementBatch, ElementSink, FilterConfig, FilterEvent, FilterManager,
    Filterable, FilterableError, Resolution,
};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

pub const WAIT: Duration = Duration::from_secs(2);

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A peer group with one peer already connected, and a manager on top.
pub fn setup(
    config: FilterConfig,
) -> (Arc<InMemoryPeerGroup>, PeerHandle, FilterManager<InMemoryPeerGroup>) {
    init_tracing();
    let group = Arc::new(InMemoryPeerGroup::new());
    let peer = group.connect("127.0.0.1:18444");
    let manager = FilterManager::new(group.clone(), config).unwrap();
    (group, peer, manager)
}

/// Messages queued for a peer, split by command.
#[derive(Debug, Default)]
pub struct Inbox {
    pub loads: Vec<FilterLoad>,
    pub adds: Vec<Vec<u8>>,
    pub last_command: Option<&'static str>,
}

pub fn drain(peer: &mut PeerHandle) -> Inbox {
    let mut inbox = Inbox::default();
    for message in peer.drain() {
        inbox.last_command = Some(message.command());
        match message {
            PeerMessage::FilterLoad(load) => inbox.loads.push(load),
            PeerMessage::FilterAdd(add) => inbox.adds.push(add.data),
        }
    }
    inbox
}

/// Every event currently queued.
pub fn pending_events(events: &mut broadcast::Receiver<FilterEvent>) -> Vec<FilterEvent> {
    let mut pending = Vec::new();
    while let Ok(event) = events.try_recv() {
        pending.push(event);
    }
    pending
}

/// Wait for the first event matching `predicate`.
pub async fn next_event<F>(events: &mut broadcast::Receiver<FilterEvent>, predicate: F) -> FilterEvent
where
    F: Fn(&FilterEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.unwrap();
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// One scripted reply to `filter_elements`.
#[derive(Clone, Debug)]
pub enum Answer {
    /// Return the batch immediately.
    Now(ElementBatch),
    /// Complete through the handle on a later turn.
    Deferred(Result<ElementBatch, FilterableError>),
    /// Return the batch immediately and complete the handle too.
    Both(ElementBatch),
    /// Return `Deferred` and drop the handle.
    Forget,
}

/// Filterable that replays a script of answers, then repeats the last one.
pub struct Scripted {
    answers: Mutex<VecDeque<Answer>>,
    last: Mutex<Answer>,
    sink: Mutex<Option<ElementSink>>,
    calls: AtomicUsize,
}

impl Scripted {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Arc<Self> {
        let answers: VecDeque<Answer> = answers.into_iter().collect();
        let last = answers.back().cloned().unwrap_or(Answer::Now(None));
        Arc::new(Self {
            answers: Mutex::new(answers),
            last: Mutex::new(last),
            sink: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(answer: Answer) -> Arc<Self> {
        Self::new([answer])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sink(&self) -> ElementSink {
        self.sink.lock().unwrap().clone().expect("not subscribed")
    }
}

impl Filterable for Scripted {
    fn filter_elements(&self, completion: Completion) -> Resolution {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.lock().unwrap().clone());

        match answer {
            Answer::Now(batch) => Resolution::Now(batch),
            Answer::Deferred(result) => {
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    completion.complete(result);
                });
                Resolution::Deferred
            }
            Answer::Both(batch) => {
                completion.complete(Ok(batch.clone()));
                Resolution::Now(batch)
            }
            Answer::Forget => {
                drop(completion);
                Resolution::Deferred
            }
        }
    }

    fn subscribe(&self, sink: ElementSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }
}

/// A wallet that reports every script it ever derived and emits new ones.
#[derive(Default)]
pub struct Wallet {
    scripts: Mutex<Vec<Vec<u8>>>,
    sink: Mutex<Option<ElementSink>>,
}

impl Wallet {
    pub fn derive(&self, scripts: Vec<Vec<u8>>) -> usize {
        self.scripts.lock().unwrap().extend(scripts.iter().cloned());
        let sink = self.sink.lock().unwrap().clone();
        sink.map_or(0, |sink| sink.emit_all(scripts))
    }
}

impl Filterable for Wallet {
    fn filter_elements(&self, _completion: Completion) -> Resolution {
        Resolution::Now(Some(self.scripts.lock().unwrap().clone()))
    }

    fn subscribe(&self, sink: ElementSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Ordered, batched delivery of service notifications
//!
//! Every notification goes through one unbounded channel to a single
//! dispatcher task. The dispatcher takes whatever has queued up since its
//! last wake-up and replays it in order, so a burst of progress updates
//! costs one wake-up rather than one per update, and listeners never run
//! concurrently with each other.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::session::State;

/// Upper bound on notifications replayed per wake-up
const BATCH: usize = 256;

/// Identifies a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type StateListener = Arc<dyn Fn(State, State) + Send + Sync>;
type ProgressListener = Arc<dyn Fn(f32, f32) + Send + Sync>;
type EventListener = Arc<dyn Fn() + Send + Sync>;
type FailureListener = Arc<dyn Fn(&Arc<Error>) + Send + Sync>;

pub(crate) enum Notice {
    State(State, State),
    Progress(f32, f32),
    Done,
    Failed(Arc<Error>),
    Aborted,
    Flush(oneshot::Sender<()>),
}

#[derive(Default, Clone)]
struct Listeners {
    state: Vec<(ListenerId, StateListener)>,
    progress: Vec<(ListenerId, ProgressListener)>,
    done: Vec<(ListenerId, EventListener)>,
    failure: Vec<(ListenerId, FailureListener)>,
    abort: Vec<(ListenerId, EventListener)>,
}

impl Listeners {
    fn deliver(&self, notice: Notice) {
        match notice {
            Notice::State(old, new) => self.state.iter().for_each(|(_, l)| l(old, new)),
            Notice::Progress(old, new) => self.progress.iter().for_each(|(_, l)| l(old, new)),
            Notice::Done => self.done.iter().for_each(|(_, l)| l()),
            Notice::Failed(error) => self.failure.iter().for_each(|(_, l)| l(&error)),
            Notice::Aborted => self.abort.iter().for_each(|(_, l)| l()),
            Notice::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.len();
        self.state.retain(|(i, _)| *i != id);
        self.progress.retain(|(i, _)| *i != id);
        self.done.retain(|(i, _)| *i != id);
        self.failure.retain(|(i, _)| *i != id);
        self.abort.retain(|(i, _)| *i != id);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.state.len()
            + self.progress.len()
            + self.done.len()
            + self.failure.len()
            + self.abort.len()
    }
}

/// Queue feeding the dispatcher task, plus the listener registry it reads
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
    listeners: Arc<RwLock<Listeners>>,
    next_id: parking_lot::Mutex<u64>,
}

impl Notifier {
    /// Spawn the dispatcher on `handle`; it stops once the notifier is dropped
    pub(crate) fn spawn(handle: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(RwLock::new(Listeners::default()));
        handle.spawn(dispatch(rx, listeners.clone()));
        Self {
            tx,
            listeners,
            next_id: parking_lot::Mutex::new(0),
        }
    }

    pub(crate) fn send(&self, notice: Notice) {
        // Only fails once the runtime has shut the dispatcher down
        let _ = self.tx.send(notice);
    }

    /// Resolves once everything queued before the call has been delivered
    pub(crate) async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Notice::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn next_id(&self) -> ListenerId {
        let mut next = self.next_id.lock();
        *next += 1;
        ListenerId(*next)
    }

    pub(crate) fn add_state_listener(&self, listener: StateListener) -> ListenerId {
        let id = self.next_id();
        self.listeners.write().state.push((id, listener));
        id
    }

    pub(crate) fn add_progress_listener(&self, listener: ProgressListener) -> ListenerId {
        let id = self.next_id();
        self.listeners.write().progress.push((id, listener));
        id
    }

    pub(crate) fn add_done_listener(&self, listener: EventListener) -> ListenerId {
        let id = self.next_id();
        self.listeners.write().done.push((id, listener));
        id
    }

    pub(crate) fn add_failure_listener(&self, listener: FailureListener) -> ListenerId {
        let id = self.next_id();
        self.listeners.write().failure.push((id, listener));
        id
    }

    pub(crate) fn add_abort_listener(&self, listener: EventListener) -> ListenerId {
        let id = self.next_id();
        self.listeners.write().abort.push((id, listener));
        id
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(id)
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<Notice>, listeners: Arc<RwLock<Listeners>>) {
    let mut batch = Vec::with_capacity(BATCH);
    while rx.recv_many(&mut batch, BATCH).await > 0 {
        // Snapshot so listeners may register or remove listeners themselves
        let snapshot = listeners.read().clone();
        tracing::trace!(count = batch.len(), "Delivering notifications");
        for notice in batch.drain(..) {
            snapshot.deliver(notice);
        }
    }
}

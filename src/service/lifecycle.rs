// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Lifecycle bookkeeping shared by every service
//!
//! State and progress live behind one lock; every change queues its
//! notification while that lock is held, so listeners see changes in the
//! order they were made. The worker slot is a single atomic holding the id
//! of the running worker (0 when idle): claiming it, releasing it and
//! aborting it are all compare-and-swaps, so exactly one of "worker
//! finished" and "worker aborted" ever wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::notify::{ListenerId, Notice, Notifier};
use crate::error::{Error, Result};
use crate::session::State;

/// Proof that a worker owns the service's worker slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTicket(u64);

struct Status {
    state: State,
    progress: f32,
}

/// State, progress, listeners and the worker slot of one service
pub struct ServiceCore {
    status: Mutex<Status>,
    notifier: Notifier,
    worker: AtomicU64,
    next_worker: AtomicU64,
    abort_handle: Mutex<Option<(u64, AbortHandle)>>,
}

impl std::fmt::Debug for ServiceCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status.lock();
        f.debug_struct("ServiceCore")
            .field("state", &status.state)
            .field("progress", &status.progress)
            .field("worker", &self.worker.load(Ordering::Acquire))
            .finish()
    }
}

impl ServiceCore {
    /// Create a core whose notifications are dispatched on `handle`
    pub fn new(handle: &Handle) -> Self {
        Self {
            status: Mutex::new(Status {
                state: State::Ready,
                progress: -1.0,
            }),
            notifier: Notifier::spawn(handle),
            worker: AtomicU64::new(0),
            next_worker: AtomicU64::new(0),
            abort_handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> State {
        self.status.lock().state
    }

    /// Completed fraction in `[0, 1]`, or -1 when unknown
    pub fn progress(&self) -> f32 {
        self.status.lock().progress
    }

    /// Whether a worker currently holds the slot
    pub fn is_busy(&self) -> bool {
        self.worker.load(Ordering::Acquire) != 0
    }

    fn set_state(&self, status: &mut Status, new: State) {
        let old = status.state;
        if old != new {
            status.state = new;
            tracing::debug!(from = %old, to = %new, "Service state");
            self.notifier.send(Notice::State(old, new));
        }
        // SENT and DONE keep the last known progress
        if !matches!(new, State::Sent | State::Done) {
            self.set_progress(status, -1.0);
        }
    }

    fn set_progress(&self, status: &mut Status, progress: f32) {
        let progress = progress.clamp(-1.0, 1.0);
        let old = status.progress;
        if old != progress {
            status.progress = progress;
            self.notifier.send(Notice::Progress(old, progress));
        }
    }

    /// Claim the worker slot and start a worker
    ///
    /// `spawn` runs only when the slot was free; the returned handle is used
    /// to cancel the worker if the service is aborted.
    pub fn start_worker<F>(&self, spawn: F) -> Result<WorkerTicket>
    where
        F: FnOnce(WorkerTicket) -> AbortHandle,
    {
        let id = self.next_worker.fetch_add(1, Ordering::Relaxed) + 1;
        if self
            .worker
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::InProgress);
        }
        {
            let mut status = self.status.lock();
            self.set_state(&mut status, State::Connecting);
        }

        let ticket = WorkerTicket(id);
        let handle = spawn(ticket);

        let mut slot = self.abort_handle.lock();
        if self.worker.load(Ordering::Acquire) == id {
            *slot = Some((id, handle));
        } else {
            // Aborted before the handle could be stored
            handle.abort();
        }
        Ok(ticket)
    }

    /// Release the slot held by `ticket`, cancelling nothing
    fn release(&self, ticket: WorkerTicket) -> bool {
        let released = self
            .worker
            .compare_exchange(ticket.0, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if released {
            let mut slot = self.abort_handle.lock();
            if matches!(*slot, Some((id, _)) if id == ticket.0) {
                *slot = None;
            }
        }
        released
    }

    /// Take the slot from whichever worker holds it and cancel that worker
    fn cancel_worker(&self) -> bool {
        let id = self.worker.load(Ordering::Acquire);
        if id == 0
            || self
                .worker
                .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return false;
        }
        if let Some((slot_id, handle)) = self.abort_handle.lock().take() {
            if slot_id == id {
                handle.abort();
            }
        }
        true
    }

    /// Settle the outcome of a worker
    ///
    /// `commit` publishes the worker's result and runs only while the worker
    /// still owns the slot; a late result from an aborted worker is dropped.
    /// Returns whether the result was accepted.
    pub fn complete<F>(&self, ticket: WorkerTicket, commit: F) -> bool
    where
        F: FnOnce() -> Result<()>,
    {
        let mut status = self.status.lock();
        if !self.release(ticket) {
            tracing::debug!("Discarding result of a cancelled worker");
            return false;
        }
        match commit() {
            Ok(()) => {
                self.set_state(&mut status, State::Done);
                self.notifier.send(Notice::Done);
            }
            Err(e) if e.is_aborted() => {
                self.set_state(&mut status, State::Aborted);
                self.notifier.send(Notice::Aborted);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Service failed");
                self.set_state(&mut status, State::Failed);
                self.notifier.send(Notice::Failed(Arc::new(e)));
            }
        }
        true
    }

    /// Copy a state from the worker, unless it is terminal or the worker is stale
    pub fn mirror_state(&self, ticket: WorkerTicket, state: State) {
        if state.is_terminal() {
            return;
        }
        let mut status = self.status.lock();
        if self.worker.load(Ordering::Acquire) == ticket.0 && !status.state.is_terminal() {
            self.set_state(&mut status, state);
        }
    }

    /// Copy progress from the worker, unless the worker is stale
    pub fn mirror_progress(&self, ticket: WorkerTicket, progress: f32) {
        let mut status = self.status.lock();
        if self.worker.load(Ordering::Acquire) == ticket.0 && !status.state.is_terminal() {
            self.set_progress(&mut status, progress);
        }
    }

    /// Cancel the running exchange
    ///
    /// Only acts while CONNECTING, SENDING, SENT or RECEIVING. Concurrent
    /// calls cancel the worker and notify abort listeners exactly once.
    pub fn abort(&self) -> bool {
        let mut status = self.status.lock();
        if !status.state.is_active() {
            return false;
        }
        self.cancel_worker();
        tracing::info!(state = %status.state, "Service aborted");
        self.set_state(&mut status, State::Aborted);
        self.notifier.send(Notice::Aborted);
        true
    }

    /// Move to FAILED from an active state and notify failure listeners
    pub fn fail(&self, error: Error) -> bool {
        let mut status = self.status.lock();
        if !status.state.is_active() {
            return false;
        }
        self.cancel_worker();
        tracing::warn!(error = %error, "Service failed");
        self.set_state(&mut status, State::Failed);
        self.notifier.send(Notice::Failed(Arc::new(error)));
        true
    }

    /// Move to DONE and notify done listeners
    pub fn done(&self) {
        let mut status = self.status.lock();
        self.set_state(&mut status, State::Done);
        self.notifier.send(Notice::Done);
    }

    /// Fail before any worker started, whatever the current state
    ///
    /// Refused with `Error::InProgress` once another send owns the worker
    /// slot.
    pub(crate) fn fail_setup(&self, error: Error) -> Result<()> {
        let mut status = self.status.lock();
        if self.is_busy() {
            return Err(Error::InProgress);
        }
        tracing::warn!(error = %error, "Service setup failed");
        self.set_state(&mut status, State::Failed);
        self.notifier.send(Notice::Failed(Arc::new(error)));
        Ok(())
    }

    /// Notify done listeners again; the service must be DONE
    pub fn fire_done(&self) -> Result<()> {
        let status = self.status.lock();
        if status.state != State::Done {
            return Err(Error::illegal_state(format!(
                "Cannot fire done event while in {}",
                status.state
            )));
        }
        self.notifier.send(Notice::Done);
        Ok(())
    }

    /// Notify failure listeners; the service must be FAILED
    pub fn fire_failure(&self, error: Error) -> Result<()> {
        let status = self.status.lock();
        if status.state != State::Failed {
            return Err(Error::illegal_state(format!(
                "Cannot fire failure event while in {}",
                status.state
            )));
        }
        self.notifier.send(Notice::Failed(Arc::new(error)));
        Ok(())
    }

    /// Notify abort listeners again; the service must be ABORTED
    pub fn fire_abort(&self) -> Result<()> {
        let status = self.status.lock();
        if status.state != State::Aborted {
            return Err(Error::illegal_state(format!(
                "Cannot fire abort event while in {}",
                status.state
            )));
        }
        self.notifier.send(Notice::Aborted);
        Ok(())
    }

    pub fn add_state_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(State, State) + Send + Sync + 'static,
    {
        self.notifier.add_state_listener(Arc::new(listener))
    }

    pub fn add_progress_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(f32, f32) + Send + Sync + 'static,
    {
        self.notifier.add_progress_listener(Arc::new(listener))
    }

    pub fn add_done_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.add_done_listener(Arc::new(listener))
    }

    pub fn add_failure_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<Error>) + Send + Sync + 'static,
    {
        self.notifier.add_failure_listener(Arc::new(listener))
    }

    pub fn add_abort_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.add_abort_listener(Arc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.notifier.remove_listener(id)
    }

    /// Wait until every notification queued so far has been delivered
    pub async fn flush(&self) {
        self.notifier.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn core() -> ServiceCore {
        ServiceCore::new(&Handle::current())
    }

    fn idle_worker() -> AbortHandle {
        tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await }).abort_handle()
    }

    #[tokio::test]
    async fn test_progress_normalization() {
        let core = core();
        let ticket = core.start_worker(|_| idle_worker()).unwrap();
        assert_eq!(core.progress(), -1.0);

        core.mirror_state(ticket, State::Sending);
        core.mirror_progress(ticket, 2.5);
        assert_eq!(core.progress(), 1.0);
        core.mirror_progress(ticket, -7.0);
        assert_eq!(core.progress(), -1.0);

        core.mirror_progress(ticket, 0.5);
        core.mirror_state(ticket, State::Sent);
        assert_eq!(core.progress(), 0.5);
        core.mirror_state(ticket, State::Receiving);
        assert_eq!(core.progress(), -1.0);
        core.abort();
    }

    #[tokio::test]
    async fn test_progress_events_only_on_change() {
        let core = core();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        core.add_progress_listener(move |old, new| sink.lock().push((old, new)));

        let ticket = core.start_worker(|_| idle_worker()).unwrap();
        core.mirror_progress(ticket, 0.25);
        core.mirror_progress(ticket, 0.25);
        core.mirror_progress(ticket, 0.5);
        core.flush().await;

        assert_eq!(*events.lock(), vec![(-1.0, 0.25), (0.25, 0.5)]);
        core.abort();
    }

    #[tokio::test]
    async fn test_second_worker_rejected() {
        let core = core();
        core.start_worker(|_| idle_worker()).unwrap();
        let err = core.start_worker(|_| idle_worker()).unwrap_err();
        assert!(matches!(err, Error::InProgress));
        core.abort();
    }

    #[tokio::test]
    async fn test_abort_only_in_active_states() {
        let core = core();
        assert!(!core.abort());
        assert_eq!(core.state(), State::Ready);

        let ticket = core.start_worker(|_| idle_worker()).unwrap();
        assert!(core.abort());
        assert!(!core.abort());
        assert_eq!(core.state(), State::Aborted);

        // The aborted worker's result is dropped
        assert!(!core.complete(ticket, || Ok(())));
        assert_eq!(core.state(), State::Aborted);
        assert!(!core.is_busy());
    }

    #[tokio::test]
    async fn test_abort_cancels_worker_task() {
        let core = core();
        let mut task = None;
        core.start_worker(|_| {
            let handle = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
            let abort = handle.abort_handle();
            task = Some(handle);
            abort
        })
        .unwrap();

        core.abort();
        let joined = task.unwrap().await;
        assert!(joined.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_complete_failure_and_fire_guards() {
        let core = core();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        core.add_failure_listener(move |e| sink.lock().push(e.to_string()));

        let ticket = core.start_worker(|_| idle_worker()).unwrap();
        assert!(core.complete(ticket, || Err(Error::decode("not json"))));
        assert_eq!(core.state(), State::Failed);

        assert!(matches!(core.fire_done(), Err(Error::IllegalState(_))));
        assert!(matches!(core.fire_abort(), Err(Error::IllegalState(_))));
        core.fire_failure(Error::other("again")).unwrap();
        core.flush().await;

        assert_eq!(
            *failures.lock(),
            vec!["Decode error: not json".to_string(), "again".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fail_ignored_when_idle() {
        let core = core();
        assert!(!core.fail(Error::other("boom")));
        assert_eq!(core.state(), State::Ready);

        core.fail_setup(Error::config("no url")).unwrap();
        assert_eq!(core.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_setup_failure_refused_while_worker_runs() {
        let core = core();
        let failures = Arc::new(Mutex::new(0));
        let sink = failures.clone();
        core.add_failure_listener(move |_| *sink.lock() += 1);

        let ticket = core.start_worker(|_| idle_worker()).unwrap();
        let err = core.fail_setup(Error::config("no url")).unwrap_err();
        assert!(matches!(err, Error::InProgress));
        assert_eq!(core.state(), State::Connecting);

        assert!(core.complete(ticket, || Ok(())));
        assert_eq!(core.state(), State::Done);
        core.flush().await;
        assert_eq!(*failures.lock(), 0);
    }

    #[tokio::test]
    async fn test_stale_worker_cannot_mirror() {
        let core = core();
        let first = core.start_worker(|_| idle_worker()).unwrap();
        core.abort();
        let second = core.start_worker(|_| idle_worker()).unwrap();
        assert_ne!(first, second);

        core.mirror_state(first, State::Receiving);
        assert_eq!(core.state(), State::Connecting);
        core.mirror_state(second, State::Sending);
        assert_eq!(core.state(), State::Sending);
        core.abort();
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Asynchronous wrapper running one request at a time on a worker task

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::MutexGuard;

use super::decode::{Passthrough, ResponseDecoder};
use super::lifecycle::{ServiceCore, WorkerTicket};
use super::Service;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::session::{self, progress_of, ExchangeObserver, Session, State, StateControl};
use crate::trust::SecurityLevel;

struct Shared<D: ResponseDecoder> {
    core: ServiceCore,
    session: tokio::sync::Mutex<Session>,
    request: RwLock<Request>,
    response: RwLock<Option<Response>>,
    output: RwLock<Option<D::Output>>,
    security_level: RwLock<Option<SecurityLevel>>,
    decoder: D,
    runtime: Handle,
}

/// Sends a [`Request`] through a [`Session`] on a background task
///
/// State and progress of the session are mirrored onto the service and
/// reported to listeners. Cloning gives another handle to the same service.
pub struct HttpService<D: ResponseDecoder = Passthrough> {
    shared: Arc<Shared<D>>,
}

impl<D: ResponseDecoder> Clone for HttpService<D> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<D: ResponseDecoder> std::fmt::Debug for HttpService<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpService")
            .field("core", &self.shared.core)
            .field("url", &self.shared.request.read().url())
            .finish()
    }
}

impl HttpService<Passthrough> {
    /// Create a service on the current Tokio runtime
    pub fn new(session: Session) -> Result<Self> {
        Self::with_decoder(session, Passthrough)
    }
}

impl<D: ResponseDecoder> HttpService<D> {
    /// Create a service whose output is produced by `decoder`
    pub fn with_decoder(session: Session, decoder: D) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("HttpService must be created inside a Tokio runtime"))?;
        Ok(Self::with_runtime(session, decoder, runtime))
    }

    /// Create a service whose worker and notifications run on `runtime`
    pub fn with_runtime(session: Session, decoder: D, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: ServiceCore::new(&runtime),
                session: tokio::sync::Mutex::new(session),
                request: RwLock::new(Request::new()),
                response: RwLock::new(None),
                output: RwLock::new(None),
                security_level: RwLock::new(None),
                decoder,
                runtime,
            }),
        }
    }

    /// Builder form of [`HttpService::set_request`]
    pub fn request_with(self, request: Request) -> Self {
        self.set_request(request);
        self
    }

    /// Copy of the request sent by the next `send`
    pub fn request(&self) -> Request {
        self.shared.request.read().clone()
    }

    pub fn set_request(&self, request: Request) {
        *self.shared.request.write() = request;
    }

    /// Edit the request in place
    pub fn update_request<F: FnOnce(&mut Request)>(&self, edit: F) {
        edit(&mut self.shared.request.write());
    }

    /// Response of the last completed exchange; cleared by `send`
    pub fn response(&self) -> Option<Response> {
        self.shared.response.read().clone()
    }

    /// Decoded output of the last completed exchange
    pub fn output(&self) -> Option<D::Output>
    where
        D::Output: Clone,
    {
        self.shared.output.read().clone()
    }

    /// Take the decoded output, leaving `None`
    pub fn take_output(&self) -> Option<D::Output> {
        self.shared.output.write().take()
    }

    /// Security level forced onto the session at each send
    pub fn security_level(&self) -> Option<SecurityLevel> {
        *self.shared.security_level.read()
    }

    pub fn set_security_level(&self, level: Option<SecurityLevel>) {
        *self.shared.security_level.write() = level;
    }

    /// Lock the session; waits while an exchange is running
    pub async fn session(&self) -> MutexGuard<'_, Session> {
        self.shared.session.lock().await
    }

    /// Start sending the current request
    ///
    /// Returns `Err(Error::InProgress)` while a previous send is running.
    /// A request that cannot be sent at all moves the service to FAILED and
    /// notifies failure listeners; `send` itself still succeeds.
    pub fn send(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.core.is_busy() {
            return Err(Error::InProgress);
        }

        let request = shared.request.read().clone();
        if let Err(e) = session::resolve_url(&request) {
            // Another send may have claimed the slot since the check above
            return shared.core.fail_setup(e);
        }

        let worker_shared = shared.clone();
        shared.core.start_worker(move |ticket| {
            *worker_shared.response.write() = None;
            *worker_shared.output.write() = None;
            let runtime = worker_shared.runtime.clone();
            runtime
                .spawn(run_worker(worker_shared, ticket, request))
                .abort_handle()
        })?;
        Ok(())
    }
}

/// Forwards session events onto the service while the worker is current
struct Mirror<'a> {
    core: &'a ServiceCore,
    ticket: WorkerTicket,
}

impl ExchangeObserver for Mirror<'_> {
    fn state_changed(&self, _old: State, new: State) {
        self.core.mirror_state(self.ticket, new);
    }

    fn progress_changed(&self, bytes_so_far: u64, total_bytes: Option<u64>) {
        self.core
            .mirror_progress(self.ticket, progress_of(bytes_so_far, total_bytes));
    }
}

async fn run_worker<D: ResponseDecoder>(
    shared: Arc<Shared<D>>,
    ticket: WorkerTicket,
    request: Request,
) {
    let mut session = shared.session.lock().await;
    if let Some(level) = *shared.security_level.read() {
        session.set_security_level(level);
    }

    let observer = Mirror {
        core: &shared.core,
        ticket,
    };
    let result = session.execute_with(&request, &observer).await;

    match result {
        Ok(response) => {
            let decoded = shared.decoder.decode(&response);
            if decoded.is_err() {
                session.force_state(State::Failed);
            }
            shared.core.complete(ticket, || {
                *shared.response.write() = Some(response);
                let output = decoded?;
                *shared.output.write() = Some(output);
                Ok(())
            });
        }
        Err(e) => {
            shared.core.complete(ticket, || Err(e));
        }
    }
}

impl<D: ResponseDecoder> Service for HttpService<D> {
    fn core(&self) -> &ServiceCore {
        &self.shared.core
    }

    fn send(&self) -> Result<()> {
        HttpService::send(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::headers;
    use crate::service::{JsonDecoder, TextDecoder};
    use crate::transport::{MockResponse, MockTransport};
    use parking_lot::Mutex;
    use std::time::Duration;

    fn service_with<D: ResponseDecoder>(
        response: MockResponse,
        decoder: D,
    ) -> (HttpService<D>, MockTransport) {
        let transport = MockTransport::with_response(response);
        let session = Session::with_transport(Arc::new(transport.clone()));
        let service = HttpService::with_decoder(session, decoder).unwrap();
        (service, transport)
    }

    async fn wait_for<S: Service>(service: &S, state: State) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while service.state() != state {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("service never reached the expected state");
        service.flush().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_send_reaches_done_with_output() {
        let (service, _) = service_with(MockResponse::new().body("hello"), TextDecoder);
        service.set_request(Request::get("http://example.com/greeting"));

        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        service.add_state_listener(move |_, new| sink.lock().push(new));
        let done = Arc::new(Mutex::new(0));
        let done_sink = done.clone();
        service.add_done_listener(move || *done_sink.lock() += 1);

        service.send().unwrap();
        wait_for(&service, State::Done).await;

        assert_eq!(
            *states.lock(),
            vec![
                State::Connecting,
                State::Sending,
                State::Sent,
                State::Receiving,
                State::Done
            ]
        );
        assert_eq!(*done.lock(), 1);
        assert_eq!(service.output().as_deref(), Some("hello"));
        assert_eq!(service.response().unwrap().status_code(), 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_worker_in_flight() {
        let (service, transport) = service_with(MockResponse::new(), Passthrough);
        service.set_request(Request::get("http://example.com/"));
        transport.hold();

        service.send().unwrap();
        assert!(matches!(service.send(), Err(Error::InProgress)));
        assert!(matches!(service.send(), Err(Error::InProgress)));

        transport.release();
        wait_for(&service, State::Done).await;
        assert_eq!(transport.open_count(), 1);

        // Finished services accept a new send
        service.send().unwrap();
        wait_for(&service, State::Done).await;
        assert_eq!(transport.open_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_abort_fires_once() {
        let (service, transport) = service_with(MockResponse::new(), Passthrough);
        service.set_request(Request::get("http://example.com/slow"));
        transport.hold();

        let aborts = Arc::new(Mutex::new(0));
        let sink = aborts.clone();
        service.add_abort_listener(move || *sink.lock() += 1);
        let dones = Arc::new(Mutex::new(0));
        let done_sink = dones.clone();
        service.add_done_listener(move || *done_sink.lock() += 1);

        service.send().unwrap();
        let callers: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.abort() })
            })
            .collect();
        let mut won = 0;
        for caller in callers {
            if caller.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 1);

        transport.release();
        tokio::time::sleep(Duration::from_millis(50)).await;
        service.flush().await;

        assert_eq!(service.state(), State::Aborted);
        assert_eq!(*aborts.lock(), 1);
        assert_eq!(*dones.lock(), 0);
        assert!(service.response().is_none());
        assert!(!service.abort());
        assert_eq!(service.session().await.state(), State::Aborted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_url_fails_without_worker() {
        let (service, transport) = service_with(MockResponse::new(), Passthrough);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        service.add_failure_listener(move |e| sink.lock().push(e.is_config()));

        service.send().unwrap();
        assert_eq!(service.state(), State::Failed);
        service.flush().await;

        assert_eq!(*failures.lock(), vec![true]);
        assert_eq!(transport.open_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_send_leaves_running_worker_alone() {
        let (service, transport) = service_with(MockResponse::new(), Passthrough);
        service.set_request(Request::get("http://example.com/"));
        let failures = Arc::new(Mutex::new(0));
        let sink = failures.clone();
        service.add_failure_listener(move |_| *sink.lock() += 1);
        transport.hold();

        service.send().unwrap();
        service.set_request(Request::new());
        assert!(matches!(service.send(), Err(Error::InProgress)));
        assert!(matches!(
            service.core().fail_setup(Error::config("no url")),
            Err(Error::InProgress)
        ));
        assert!(service.state().is_active());

        transport.release();
        wait_for(&service, State::Done).await;
        assert_eq!(*failures.lock(), 0);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_decode_failure_fails_service_and_session() {
        let (service, _) = service_with(
            MockResponse::new().body("<html></html>"),
            JsonDecoder::<serde_json::Value>::new(),
        );
        service.set_request(Request::get("http://example.com/api"));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        service.add_failure_listener(move |e| sink.lock().push(matches!(**e, Error::Decode(_))));

        service.send().unwrap();
        wait_for(&service, State::Failed).await;

        assert_eq!(*failures.lock(), vec![true]);
        assert!(service.output().is_none());
        assert!(service.response().is_some());
        assert_eq!(service.session().await.state(), State::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fire_events_out_of_sequence() {
        let (service, _) = service_with(MockResponse::new(), Passthrough);
        service.set_request(Request::get("http://example.com/"));
        assert!(matches!(service.core().fire_done(), Err(Error::IllegalState(_))));

        service.send().unwrap();
        wait_for(&service, State::Done).await;
        service.core().fire_done().unwrap();
        assert!(matches!(service.core().fire_abort(), Err(Error::IllegalState(_))));
        assert!(matches!(
            service.core().fire_failure(Error::other("late")),
            Err(Error::IllegalState(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_upload_progress_mirrored() {
        let (service, _) = service_with(MockResponse::new().body("ok"), Passthrough);
        service.set_request(
            Request::post("http://example.com/upload")
                .header(headers::CONTENT_LENGTH, "20000")
                .bytes(vec![b'x'; 20000]),
        );
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        service.add_progress_listener(move |_, new| sink.lock().push(new));

        service.send().unwrap();
        wait_for(&service, State::Done).await;

        let progress = progress.lock();
        assert!(progress.iter().all(|p| (-1.0..=1.0).contains(p)));
        assert!(progress.contains(&1.0));
        assert!(progress.windows(2).all(|w| w[0] != w[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_security_level_applied_at_send() {
        let (service, transport) = service_with(MockResponse::new(), Passthrough);
        service.set_request(Request::get("https://example.com/"));
        service.set_security_level(Some(SecurityLevel::High));

        service.send().unwrap();
        wait_for(&service, State::Done).await;

        assert_eq!(
            transport.last_request().unwrap().security_level,
            Some(SecurityLevel::High)
        );
        assert_eq!(service.session().await.security_level(), SecurityLevel::High);
    }

    #[test]
    fn test_requires_runtime() {
        let session = Session::with_transport(Arc::new(MockTransport::new()));
        let err = HttpService::new(session).unwrap_err();
        assert!(err.is_config());
    }
}

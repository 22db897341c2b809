// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session execution engine
//!
//! A [`Session`] turns a [`Request`] into a [`Response`] over a
//! [`Transport`], publishing state and byte-level progress as it goes.
//!
//! # Example
//!
//! ```rust,no_run
//! use courier::{Request, Session};
//!
//! # async fn example() -> courier::Result<()> {
//! let mut session = Session::new()?;
//! let response = session.execute(&Request::get("https://example.com")).await?;
//! println!("{} {}", response.status_code(), response.text());
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod state;

use std::sync::Arc;

use reqwest::Method;

use crate::error::Result;
use crate::http::{CookieJar, Parameter, Request, Response};
use crate::transport::{HttpTransport, Transport};
use crate::trust::{RejectUnknown, SecurityLevel, TrustDecider, TrustPolicy};

pub use config::SessionConfig;
pub use state::{progress_of, ExchangeObserver, State, StateControl};

use engine::Exchange;
pub(crate) use engine::resolve_url;

/// Execution context for sequential request/response exchanges
///
/// `execute` takes `&mut self`: one exchange at a time per session. Share
/// the [`CookieJar`] rather than the session to run exchanges in parallel.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    decider: Arc<dyn TrustDecider>,
    cookie_jar: Option<CookieJar>,
    state: State,
    total_bytes: Option<u64>,
    bytes_so_far: u64,
}

impl Session {
    /// Create a session over HTTP with default configuration
    pub fn new() -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new()?)))
    }

    /// Create a session over the given transport
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(SessionConfig::default(), transport)
    }

    /// Create a session with custom configuration
    pub fn with_config(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let cookie_jar = config.handle_cookies.then(CookieJar::new);
        Self {
            config,
            transport,
            decider: Arc::new(RejectUnknown),
            cookie_jar,
            state: State::Ready,
            total_bytes: None,
            bytes_so_far: 0,
        }
    }

    /// Share a cookie jar with this session
    pub fn cookie_jar(mut self, jar: CookieJar) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Set the decider consulted about unknown certificates
    pub fn trust_decider(mut self, decider: Arc<dyn TrustDecider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.config.security_level
    }

    pub fn set_security_level(&mut self, level: SecurityLevel) {
        self.config.security_level = level;
    }

    pub fn set_trust_decider(&mut self, decider: Arc<dyn TrustDecider>) {
        self.decider = decider;
    }

    /// Trust policy applied to HTTPS exchanges
    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy::new(self.config.security_level).with_decider(self.decider.clone())
    }

    /// Cookie jar, when cookie handling is enabled
    pub fn cookies(&self) -> Option<&CookieJar> {
        self.cookie_jar.as_ref()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// State of the current or last exchange
    pub fn state(&self) -> State {
        self.state
    }

    /// Bytes moved in the current phase
    pub fn bytes_so_far(&self) -> u64 {
        self.bytes_so_far
    }

    /// Size of the current phase, when known
    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    /// Fraction of the current phase completed, or -1 when unknown
    pub fn progress(&self) -> f32 {
        progress_of(self.bytes_so_far, self.total_bytes)
    }

    /// Execute a request
    pub async fn execute(&mut self, request: &Request) -> Result<Response> {
        self.execute_with(request, &()).await
    }

    /// Execute a request, reporting every state and progress change
    pub async fn execute_with(
        &mut self,
        request: &Request,
        observer: &dyn ExchangeObserver,
    ) -> Result<Response> {
        Exchange::new(self, observer).execute(request).await
    }

    /// Execute a request built from a method, URL and parameters.
    ///
    /// Parameters are applied before the URL so that a query string in
    /// `url` is merged into them.
    pub async fn execute_method(
        &mut self,
        method: Method,
        url: &str,
        params: &[Parameter],
    ) -> Result<Response> {
        let mut request = Request::new();
        for param in params {
            request.set_parameter(param.name.clone(), param.value.clone());
        }
        request.set_method(method);
        request.set_url(url);
        self.execute(&request).await
    }

    /// Execute a GET request
    pub async fn get(&mut self, url: &str) -> Result<Response> {
        self.execute_method(Method::GET, url, &[]).await
    }

    /// Execute a POST request
    pub async fn post(&mut self, url: &str, params: &[Parameter]) -> Result<Response> {
        self.execute_method(Method::POST, url, params).await
    }

    /// Execute a PUT request
    pub async fn put(&mut self, url: &str, params: &[Parameter]) -> Result<Response> {
        self.execute_method(Method::PUT, url, params).await
    }
}

impl StateControl for Session {
    fn force_state(&mut self, state: State) {
        tracing::debug!(from = %self.state, to = %state, "Session state forced");
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::http::{Body, Cookie};
    use crate::transport::{MockFailure, MockResponse, MockTransport};
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        State(State, State),
        Progress(u64, Option<u64>),
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn states(&self) -> Vec<State> {
            let events = self.events.lock();
            let mut states = Vec::new();
            for event in events.iter() {
                if let Event::State(old, new) = event {
                    if states.is_empty() {
                        states.push(*old);
                    }
                    states.push(*new);
                }
            }
            states
        }

        /// Progress events published while in `state`
        fn progress_in(&self, state: State) -> Vec<(u64, Option<u64>)> {
            let mut current = State::Ready;
            let mut out = Vec::new();
            for event in self.events.lock().iter() {
                match event {
                    Event::State(_, new) => current = *new,
                    Event::Progress(bytes, total) if current == state => out.push((*bytes, *total)),
                    Event::Progress(..) => {}
                }
            }
            out
        }
    }

    impl ExchangeObserver for Recorder {
        fn state_changed(&self, old: State, new: State) {
            self.events.lock().push(Event::State(old, new));
        }

        fn progress_changed(&self, bytes_so_far: u64, total_bytes: Option<u64>) {
            self.events.lock().push(Event::Progress(bytes_so_far, total_bytes));
        }
    }

    fn session(response: MockResponse) -> (Session, MockTransport) {
        let transport = MockTransport::with_response(response);
        (Session::with_transport(Arc::new(transport.clone())), transport)
    }

    #[tokio::test]
    async fn test_state_sequence() {
        let (mut session, _) = session(MockResponse::new());
        let recorder = Recorder::default();
        let response = session
            .execute_with(&Request::get("http://mock.test/"), &recorder)
            .await
            .unwrap();

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "<html><head></head><body>Hello!</body></html>");
        assert_eq!(
            recorder.states(),
            vec![
                State::Ready,
                State::Connecting,
                State::Sending,
                State::Sent,
                State::Receiving,
                State::Done
            ]
        );
        // Counters reset before CONNECTING
        assert_eq!(recorder.events.lock()[0], Event::Progress(0, None));
        assert_eq!(session.state(), State::Done);
    }

    #[tokio::test]
    async fn test_upload_progress_with_declared_length() {
        let (mut session, transport) = session(MockResponse::new());
        let body = vec![1u8; 20_000];
        let request = Request::post("http://mock.test/upload")
            .header("Content-Length", "20000")
            .body(body.clone());
        let recorder = Recorder::default();
        session.execute_with(&request, &recorder).await.unwrap();

        let sending = recorder.progress_in(State::Sending);
        assert_eq!(
            sending,
            vec![(8096, Some(20_000)), (16_192, Some(20_000)), (20_000, Some(20_000))]
        );
        assert_eq!(transport.last_request().unwrap().body, body);
        assert!(transport.last_request().unwrap().output_closed);
    }

    #[tokio::test]
    async fn test_upload_progress_without_declared_length() {
        let (mut session, _) = session(MockResponse::new());
        let request = Request::post("http://mock.test/upload").body(vec![0u8; 100]);
        let recorder = Recorder::default();
        session.execute_with(&request, &recorder).await.unwrap();

        let sending = recorder.progress_in(State::Sending);
        assert_eq!(sending, vec![(100, None)]);
    }

    #[tokio::test]
    async fn test_download_progress() {
        let (mut session, _) = session(
            MockResponse::new()
                .header("Content-Length", "25")
                .body(vec![b'a'; 25])
                .chunk_size(10),
        );
        let recorder = Recorder::default();
        session
            .execute_with(&Request::get("http://mock.test/"), &recorder)
            .await
            .unwrap();

        let receiving = recorder.progress_in(State::Receiving);
        assert_eq!(receiving, vec![(10, Some(25)), (20, Some(25)), (25, Some(25))]);
        assert_eq!(session.progress(), 1.0);
    }

    #[tokio::test]
    async fn test_parameters_and_headers_sent() {
        let (mut session, transport) = session(MockResponse::new());
        let request = Request::get("http://mock.test/search?q=rust+lang")
            .parameter("page", "2")
            .header("X-Trace", "abc");
        session.execute(&request).await.unwrap();

        let recorded = transport.last_request().unwrap();
        assert_eq!(recorded.url.as_str(), "http://mock.test/search?q=rust+lang&page=2");
        assert_eq!(recorded.header("x-trace"), Some("abc"));
        assert_eq!(recorded.header("accept-encoding"), Some("gzip"));
        assert!(recorded.follow_redirects);
        assert_eq!(recorded.security_level, None);
    }

    #[tokio::test]
    async fn test_https_carries_trust_policy() {
        let (mut session, transport) = session(MockResponse::new());
        session.set_security_level(SecurityLevel::High);
        session.get("https://mock.test/").await.unwrap();
        assert_eq!(
            transport.last_request().unwrap().security_level,
            Some(SecurityLevel::High)
        );
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let (mut session, transport) = session(MockResponse::new());
        let err = session.execute(&Request::new()).await.unwrap_err();
        assert!(err.is_config());
        assert_eq!(session.state(), State::Failed);
        assert_eq!(transport.open_count(), 0);
    }

    #[tokio::test]
    async fn test_non_http_scheme_fails() {
        let (mut session, _) = session(MockResponse::new());
        let err = session.get("ftp://mock.test/file").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(session.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_unknown_host_synthesizes_404() {
        let (mut session, _) = session(MockResponse::new().failure(MockFailure::UnknownHost));
        let response = session.get("http://nowhere.test/a/b").await.unwrap();
        assert_eq!(response.status, reqwest::StatusCode::NOT_FOUND);
        assert_eq!(response.status_text, "Unknown host");
        assert_eq!(response.base_url, "http://nowhere.test/a/b");
        assert_eq!(session.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_retry_synthesizes_404() {
        let (mut session, _) = session(
            MockResponse::new().failure(MockFailure::Retry("cannot retry".into())),
        );
        let response = session.get("http://mock.test/").await.unwrap();
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.status_text, "HttpRetryException: cannot retry");
        assert_eq!(session.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_embedded_status_reads_error_body() {
        let (mut session, _) = session(
            MockResponse::new()
                .body("denied")
                .failure(MockFailure::EmbeddedStatus(403)),
        );
        let response = session.get("http://mock.test/secret").await.unwrap();
        assert_eq!(response.status_code(), 403);
        assert_eq!(response.text(), "denied");
        assert_eq!(session.state(), State::Done);
    }

    #[tokio::test]
    async fn test_embedded_status_keeps_received_headers() {
        let (mut session, _) = session(
            MockResponse::new()
                .header("Content-Type", "text/plain; charset=ISO-8859-1")
                .header("Set-Cookie", "sid=abc; Path=/")
                .header("Content-Length", "4")
                .body(&b"ei\xe4!"[..])
                .failure(MockFailure::EmbeddedStatus(401)),
        );
        let response = session.get("http://mock.test/login").await.unwrap();

        assert_eq!(response.status_code(), 401);
        assert_eq!(response.status_text, "Unauthorized");
        assert_eq!(response.charset.as_deref(), Some("ISO-8859-1"));
        assert_eq!(response.text(), "ei\u{e4}!");
        assert_eq!(response.content_length(), Some(4));
        let jar = session.cookies().unwrap();
        assert_eq!(jar.get("sid", ".mock.test").unwrap().value, "abc");
    }

    #[tokio::test]
    async fn test_body_embedded_status_replaces_head_status() {
        let (mut session, _) = session(
            MockResponse::new()
                .header("Content-Type", "text/plain")
                .body("slow down")
                .failure(MockFailure::BodyEmbeddedStatus(429)),
        );
        let response = session.get("http://mock.test/api").await.unwrap();

        assert_eq!(response.status_code(), 429);
        assert_eq!(response.status_text, "Too Many Requests");
        assert_eq!(response.text(), "slow down");
        assert!(response.header("content-type").is_some());
        assert_eq!(session.state(), State::Done);
    }

    #[derive(Debug)]
    struct StatusOnOpen;

    #[async_trait::async_trait]
    impl Transport for StatusOnOpen {
        async fn open(
            &self,
            url: &url::Url,
            _options: crate::transport::ConnectOptions,
        ) -> std::result::Result<Box<dyn crate::transport::Connection>, crate::transport::TransportError>
        {
            Err(crate::transport::TransportError::other(format!(
                "Server returned HTTP response code: 503 for URL: {}",
                url
            )))
        }
    }

    #[tokio::test]
    async fn test_embedded_status_on_open_is_named() {
        let mut session = Session::with_transport(Arc::new(StatusOnOpen));
        let err = session.get("http://mock.test/").await.unwrap_err();
        assert!(matches!(err, Error::StatusWithoutConnection(503)));
        assert_eq!(session.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_not_found_reads_error_body_with_transport_status() {
        let (mut session, _) = session(
            MockResponse::new()
                .status(410)
                .body("gone")
                .failure(MockFailure::NotFound),
        );
        let response = session.get("http://mock.test/old").await.unwrap();
        assert_eq!(response.status_code(), 410);
        assert_eq!(response.text(), "gone");
    }

    #[tokio::test]
    async fn test_io_error_propagates() {
        let (mut session, _) = session(MockResponse::new().failure(MockFailure::Io("reset".into())));
        let err = session.get("http://mock.test/").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(session.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_read_error_propagates() {
        let (mut session, _) = session(
            MockResponse::new()
                .body(vec![0u8; 100])
                .chunk_size(10)
                .failure(MockFailure::ReadError),
        );
        assert!(session.get("http://mock.test/").await.is_err());
        assert_eq!(session.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_interrupted_aborts() {
        let (mut session, _) = session(MockResponse::new().failure(MockFailure::Interrupted));
        let err = session.get("http://mock.test/").await.unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(session.state(), State::Aborted);
    }

    #[tokio::test]
    async fn test_dropped_exchange_aborts() {
        let (mut session, transport) = session(MockResponse::new());
        transport.hold();
        let request = Request::get("http://mock.test/");
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            session.execute(&request),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(session.state(), State::Aborted);
    }

    #[tokio::test]
    async fn test_body_open_failure_fails() {
        let (mut session, transport) = session(MockResponse::new());
        let request = Request::post("http://mock.test/")
            .body(Body::File("/definitely/not/here.bin".into()));
        let err = session.execute(&request).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(session.state(), State::Failed);
        assert!(transport.last_request().unwrap().output_closed);
    }

    #[tokio::test]
    async fn test_gzip_decoded_transparently() {
        let (mut session, _) = session(
            MockResponse::new()
                .header("Content-Type", "text/plain; charset=ISO-8859-1")
                .body(&b"caf\xe9"[..])
                .gzip(true),
        );
        let response = session.get("http://mock.test/").await.unwrap();
        assert_eq!(response.charset.as_deref(), Some("ISO-8859-1"));
        assert_eq!(response.text(), "caf\u{e9}");
    }

    #[tokio::test]
    async fn test_cookies_round_trip_through_jar() {
        let (mut session, transport) = session(
            MockResponse::new()
                .header("Set-Cookie", "sid=abc; path=/")
                .header("Set-Cookie", "theme=dark"),
        );
        let first = session.get("http://www.mock.test/login").await.unwrap();
        assert_eq!(first.headers.value("set-cookie"), Some("theme=dark"));
        assert_eq!(first.header("Set-Cookie").unwrap().elements().len(), 2);

        let jar = session.cookies().unwrap();
        assert_eq!(jar.get("sid", ".www.mock.test").unwrap().value, "abc");

        session.get("http://www.mock.test/home").await.unwrap();
        let cookie = transport.last_request().unwrap();
        let sent = cookie.header("cookie").unwrap();
        assert!(sent.contains("sid=abc"));
        assert!(sent.contains("theme=dark"));
    }

    #[tokio::test]
    async fn test_shared_jar_and_disabled_cookies() {
        let jar = CookieJar::new();
        jar.add(Cookie::new("shared", "1").domain("mock.test"));
        let transport = MockTransport::new();
        let mut with_jar =
            Session::with_transport(Arc::new(transport.clone())).cookie_jar(jar.clone());
        with_jar.get("http://mock.test/").await.unwrap();
        assert_eq!(transport.last_request().unwrap().header("cookie"), Some("shared=1"));

        let mut without = Session::with_config(
            SessionConfig::default().handle_cookies(false),
            Arc::new(transport.clone()),
        );
        without.get("http://mock.test/").await.unwrap();
        assert!(transport.last_request().unwrap().header("cookie").is_none());
    }

    #[tokio::test]
    async fn test_force_state() {
        let (mut session, _) = session(MockResponse::new());
        session.get("http://mock.test/").await.unwrap();
        session.force_state(State::Failed);
        assert_eq!(session.state(), State::Failed);
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-memory transport for driving the session without a network

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::Method;
use tokio::sync::Semaphore;
use url::Url;

use super::{ConnectOptions, Connection, ResponseHead, Transport, TransportError};
use crate::http::{headers, BodyStream, CHUNK_SIZE};
use crate::trust::SecurityLevel;

const DEFAULT_BODY: &str = "<html><head></head><body>Hello!</body></html>";

/// Failure a scripted response should produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// `connect` fails with an unknown host
    UnknownHost,
    /// `connect` fails with a retry error carrying this message
    Retry(String),
    /// `connect` fails with an I/O error whose message embeds the status;
    /// the response body is served as the error body
    EmbeddedStatus(u16),
    /// `connect` succeeds but `body` fails with an I/O error whose message
    /// embeds the status; the response body is served as the error body
    BodyEmbeddedStatus(u16),
    /// `body` reports not-found; the response body is served as the error body
    NotFound,
    /// `connect` fails with a plain I/O error
    Io(String),
    /// `connect` is interrupted
    Interrupted,
    /// The body stream fails after its first chunk
    ReadError,
}

/// Scripted response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Compress the body and report `gzip` content encoding
    pub gzip: bool,
    /// Size of the chunks the body is served in
    pub chunk_size: usize,
    pub failure: Option<MockFailure>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: 200,
            reason: Some("OK".to_string()),
            headers: Vec::new(),
            body: Bytes::from_static(DEFAULT_BODY.as_bytes()),
            gzip: false,
            chunk_size: CHUNK_SIZE,
            failure: None,
        }
    }
}

impl MockResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn failure(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    fn content_length(&self) -> Option<u64> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(headers::CONTENT_LENGTH))
            .and_then(|(_, v)| v.trim().parse().ok())
    }

    fn wire_body(&self) -> io::Result<Bytes> {
        if !self.gzip {
            return Ok(self.body.clone());
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.body)?;
        Ok(Bytes::from(encoder.finish()?))
    }
}

/// A request as seen by the mock transport
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub follow_redirects: bool,
    pub security_level: Option<SecurityLevel>,
    /// Every byte written to the output channel
    pub body: Vec<u8>,
    pub output_closed: bool,
}

impl RecordedRequest {
    /// Value of a request header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct MockState {
    fallback: Mutex<MockResponse>,
    script: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

/// Transport that serves scripted responses and records what was sent.
///
/// Queued responses are served first, in order; afterwards every exchange
/// gets the fallback response.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport serving `response` to every exchange
    pub fn with_response(response: MockResponse) -> Self {
        let transport = Self::new();
        transport.set_response(response);
        transport
    }

    /// Replace the fallback response
    pub fn set_response(&self, response: MockResponse) {
        *self.state.fallback.lock() = response;
    }

    /// Queue a response for the next exchange
    pub fn push_response(&self, response: MockResponse) {
        self.state.script.lock().push_back(response);
    }

    /// Hold every `connect` until [`MockTransport::release`] is called
    pub fn hold(&self) {
        *self.state.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let held and future exchanges proceed
    pub fn release(&self) {
        if let Some(gate) = self.state.gate.lock().take() {
            gate.close();
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.requests.lock().last().cloned()
    }

    /// Number of connections opened so far
    pub fn open_count(&self) -> usize {
        self.state.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        url: &Url,
        options: ConnectOptions,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let response = self
            .state
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.state.fallback.lock().clone());

        let index = {
            let mut requests = self.state.requests.lock();
            requests.push(RecordedRequest {
                method: options.method,
                url: url.clone(),
                headers: options.headers,
                follow_redirects: options.follow_redirects,
                security_level: options.trust.as_ref().map(|t| t.level()),
                body: Vec::new(),
                output_closed: false,
            });
            requests.len() - 1
        };

        Ok(Box::new(MockConnection {
            state: self.state.clone(),
            index,
            url: url.clone(),
            response,
            wire: None,
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    index: usize,
    url: Url,
    response: MockResponse,
    wire: Option<Bytes>,
}

impl MockConnection {
    fn wire(&mut self) -> Result<Bytes, TransportError> {
        if let Some(wire) = &self.wire {
            return Ok(wire.clone());
        }
        let wire = self.response.wire_body()?;
        self.wire = Some(wire.clone());
        Ok(wire)
    }

    fn embedded_status_error(&self, code: u16) -> TransportError {
        TransportError::other(format!(
            "Server returned HTTP response code: {} for URL: {}",
            code, self.url
        ))
    }

    fn scripted_head(&self) -> ResponseHead {
        let content_encoding = if self.response.gzip {
            Some("gzip".to_string())
        } else {
            self.response
                .headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(headers::CONTENT_ENCODING))
                .map(|(_, v)| v.to_ascii_lowercase())
        };

        ResponseHead {
            status: self.response.status,
            reason: self.response.reason.clone(),
            headers: self.response.headers.clone(),
            content_length: self.response.content_length(),
            content_encoding,
        }
    }

    fn chunked(&mut self) -> Result<BodyStream, TransportError> {
        let wire = self.wire()?;
        let size = self.response.chunk_size.max(1);
        let chunks: Vec<io::Result<Bytes>> = (0..wire.len())
            .step_by(size)
            .map(|start| Ok(wire.slice(start..(start + size).min(wire.len()))))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn write(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        if let Some(request) = self.state.requests.lock().get_mut(self.index) {
            request.body.extend_from_slice(&chunk);
        }
        Ok(())
    }

    async fn close_output(&mut self) -> Result<(), TransportError> {
        if let Some(request) = self.state.requests.lock().get_mut(self.index) {
            request.output_closed = true;
        }
        Ok(())
    }

    async fn connect(&mut self) -> Result<ResponseHead, TransportError> {
        let gate = self.state.gate.lock().clone();
        if let Some(gate) = gate {
            // Closing the gate is the release signal
            let _ = gate.acquire().await;
        }

        match &self.response.failure {
            Some(MockFailure::UnknownHost) => {
                return Err(TransportError::UnknownHost(
                    self.url.host_str().unwrap_or_default().to_string(),
                ))
            }
            Some(MockFailure::Retry(msg)) => return Err(TransportError::Retry(msg.clone())),
            Some(MockFailure::EmbeddedStatus(code)) => {
                return Err(self.embedded_status_error(*code))
            }
            Some(MockFailure::Io(msg)) => return Err(TransportError::other(msg.clone())),
            Some(MockFailure::Interrupted) => return Err(TransportError::Interrupted),
            Some(MockFailure::BodyEmbeddedStatus(_))
            | Some(MockFailure::NotFound)
            | Some(MockFailure::ReadError)
            | None => {}
        }

        Ok(self.scripted_head())
    }

    async fn body(&mut self) -> Result<BodyStream, TransportError> {
        match self.response.failure {
            Some(MockFailure::NotFound) => Err(TransportError::NotFound),
            Some(MockFailure::BodyEmbeddedStatus(code)) => Err(self.embedded_status_error(code)),
            Some(MockFailure::ReadError) => {
                let wire = self.wire()?;
                let first = wire.slice(..self.response.chunk_size.min(wire.len()));
                Ok(stream::iter(vec![
                    Ok(first),
                    Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "connection reset by peer",
                    )),
                ])
                .boxed())
            }
            _ => self.chunked(),
        }
    }

    fn error_body(&mut self) -> Option<BodyStream> {
        match self.response.failure {
            Some(MockFailure::NotFound)
            | Some(MockFailure::EmbeddedStatus(_))
            | Some(MockFailure::BodyEmbeddedStatus(_)) => self.chunked().ok(),
            _ => None,
        }
    }

    fn received_head(&self) -> Option<ResponseHead> {
        match self.response.failure {
            Some(MockFailure::EmbeddedStatus(_)) => Some(self.scripted_head()),
            _ => None,
        }
    }
}

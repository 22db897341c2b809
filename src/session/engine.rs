// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! The request execution engine
//!
//! One [`Exchange`] per `Session::execute` call. It borrows the session
//! mutably for its whole life, so the session's progress fields always
//! describe exactly one exchange.

use std::io::Read;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use futures::StreamExt;
use reqwest::StatusCode;
use url::Url;

use super::state::{ExchangeObserver, State};
use super::Session;
use crate::error::{Error, Result};
use crate::http::{
    headers, BodyStream, Header, HeaderElement, HeaderSet, Request, Response, CHUNK_SIZE,
};
use crate::transport::{ConnectOptions, Connection, ResponseHead, TransportError};

/// Relative reference used to find the directory of the request URL
const BASE_REFERENCE: &str = "foo";

/// How a transport failure is turned into something the caller can use
enum Recovery {
    /// Hand this response back; the exchange is over
    Respond(Response),
    /// The failure carried a status; read the error body and carry on
    ErrorBody(u16),
}

pub(super) struct Exchange<'a> {
    session: &'a mut Session,
    observer: &'a dyn ExchangeObserver,
}

impl<'a> Exchange<'a> {
    pub(super) fn new(session: &'a mut Session, observer: &'a dyn ExchangeObserver) -> Self {
        Self { session, observer }
    }

    fn set_state(&mut self, new: State) {
        let old = self.session.state;
        if old == new {
            return;
        }
        self.session.state = new;
        tracing::debug!(from = %old, to = %new, "Session state");
        self.observer.state_changed(old, new);
    }

    fn set_progress(&mut self, bytes_so_far: u64, total_bytes: Option<u64>) {
        self.session.bytes_so_far = bytes_so_far;
        self.session.total_bytes = total_bytes;
        self.observer.progress_changed(bytes_so_far, total_bytes);
    }

    fn add_bytes(&mut self, len: usize) {
        let bytes = self.session.bytes_so_far + len as u64;
        let total = self.session.total_bytes;
        tracing::trace!(bytes_so_far = bytes, total_bytes = ?total, "Progress");
        self.set_progress(bytes, total);
    }

    /// Run the exchange, settling the state on failure
    pub(super) async fn execute(mut self, request: &Request) -> Result<Response> {
        let result = self.run(request).await;
        if let Err(ref e) = result {
            if !self.session.state.is_terminal() {
                self.set_state(if e.is_aborted() {
                    State::Aborted
                } else {
                    State::Failed
                });
            }
        }
        result
    }

    async fn run(&mut self, request: &Request) -> Result<Response> {
        self.set_progress(0, None);
        self.set_state(State::Connecting);

        let url = resolve_url(request)?;
        let options = self.connect_options(request, &url);

        let declared = request
            .get_header(headers::CONTENT_LENGTH)
            .and_then(|h| h.value().trim().parse::<u64>().ok());
        self.set_progress(0, declared);

        let mut conn = match self.session.transport.open(&url, options).await {
            Ok(conn) => conn,
            Err(e) => match self.recover(e, request)? {
                Recovery::Respond(response) => return Ok(response),
                Recovery::ErrorBody(status) => return Err(Error::StatusWithoutConnection(status)),
            },
        };

        self.set_state(State::Sending);
        if let Some(body) = request.body_source() {
            let sent = match body.open().await {
                Ok(stream) => self.send_body(conn.as_mut(), stream).await,
                Err(e) => Err(Error::Io(e)),
            };
            let closed = conn.close_output().await;
            sent?;
            closed?;
        }

        self.set_state(State::Sent);
        let (head, mut from_error_body) = match conn.connect().await {
            Ok(head) => (head, false),
            Err(e) => match self.recover(e, request)? {
                Recovery::Respond(response) => return Ok(response),
                Recovery::ErrorBody(status) => {
                    // Headers that arrived before the failure still count
                    let head = conn.received_head().unwrap_or_default();
                    (
                        ResponseHead {
                            status,
                            reason: None,
                            ..head
                        },
                        true,
                    )
                }
            },
        };
        self.set_progress(0, head.content_length);
        self.set_state(State::Receiving);

        let response_headers = self.collect_headers(&head, &url);

        let mut status = head.status;
        let stream = if from_error_body {
            conn.error_body()
        } else {
            match conn.body().await {
                Ok(stream) => Some(stream),
                Err(TransportError::NotFound) => conn.error_body(),
                Err(e) => match self.recover(e, request)? {
                    Recovery::Respond(response) => return Ok(response),
                    Recovery::ErrorBody(embedded) => {
                        status = embedded;
                        from_error_body = true;
                        conn.error_body()
                    }
                },
            }
        };
        let mut body = match stream {
            Some(stream) => self.drain(stream).await?,
            None => Bytes::new(),
        };
        if !from_error_body && head.content_encoding.as_deref() == Some("gzip") {
            body = gunzip(&body)?;
        }

        let reason = if status == head.status {
            head.reason.clone()
        } else {
            None
        };
        let status = StatusCode::from_u16(status)
            .map_err(|_| Error::other(format!("Invalid status code {}", status)))?;
        let status_text = reason
            .or_else(|| status.canonical_reason().map(String::from))
            .unwrap_or_default();
        let charset = response_headers
            .get(headers::CONTENT_TYPE)
            .and_then(|h| h.param("charset"))
            .map(String::from);

        let response = Response::new(
            status,
            status_text,
            response_headers,
            body,
            charset,
            base_url(&url),
        );
        tracing::info!(
            status = response.status_code(),
            url = %url,
            body_len = response.body_len(),
            "Response received"
        );
        self.set_state(State::Done);
        Ok(response)
    }

    fn connect_options(&self, request: &Request, url: &Url) -> ConnectOptions {
        let mut headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|h| (h.name().to_string(), h.value().to_string()))
            .collect();

        if let Some(jar) = self.session.cookies() {
            if !request.headers().contains(headers::COOKIE) {
                if let Some(cookie) = jar.cookie_header(url) {
                    headers.push((headers::COOKIE.to_string(), cookie));
                }
            }
        }

        let trust = (url.scheme() == "https").then(|| self.session.trust_policy());
        tracing::info!(method = %request.method(), url = %url, "Executing request");

        ConnectOptions {
            method: request.method().clone(),
            follow_redirects: request.follows_redirects(),
            headers,
            trust,
        }
    }

    async fn send_body(&mut self, conn: &mut dyn Connection, mut stream: BodyStream) -> Result<()> {
        while let Some(chunk) = stream.next().await {
            let mut chunk = chunk?;
            while !chunk.is_empty() {
                let piece = chunk.split_to(chunk.len().min(CHUNK_SIZE));
                let len = piece.len();
                conn.write(piece).await?;
                self.add_bytes(len);
            }
        }
        Ok(())
    }

    async fn drain(&mut self, mut stream: BodyStream) -> Result<Bytes> {
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(TransportError::Io)?;
            buffer.extend_from_slice(&chunk);
            self.add_bytes(chunk.len());
        }
        Ok(Bytes::from(buffer))
    }

    /// Header set of the response; `Set-Cookie` values go into the jar
    fn collect_headers(&self, head: &ResponseHead, url: &Url) -> HeaderSet {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (name, value) in &head.headers {
            match grouped.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                Some((_, values)) => values.push(value.clone()),
                None => grouped.push((name.clone(), vec![value.clone()])),
            }
        }

        let jar = self.session.cookies();
        grouped
            .into_iter()
            .filter_map(|(name, values)| {
                if let (true, Some(jar)) = (name.eq_ignore_ascii_case(headers::SET_COOKIE), jar) {
                    for value in &values {
                        jar.add_from_header(value, url);
                    }
                }
                let last = values.last()?.clone();
                let elements = values
                    .iter()
                    .flat_map(|v| HeaderElement::parse_all(v))
                    .collect();
                Some(Header::with_elements(name, last, elements))
            })
            .collect()
    }

    /// Apply the transport error policy
    fn recover(&mut self, err: TransportError, request: &Request) -> Result<Recovery> {
        let request_url = request.url().unwrap_or_default().to_string();
        match err {
            TransportError::Retry(msg) => {
                tracing::warn!(url = %request_url, error = %msg, "Retry required, answering 404");
                self.set_state(State::Failed);
                Ok(Recovery::Respond(not_found(
                    format!("HttpRetryException: {}", msg),
                    request_url,
                )))
            }
            TransportError::UnknownHost(host) => {
                tracing::warn!(url = %request_url, host = %host, "Unknown host, answering 404");
                self.set_state(State::Failed);
                Ok(Recovery::Respond(not_found("Unknown host", request_url)))
            }
            TransportError::Interrupted => Err(Error::Aborted),
            other => match other.embedded_status() {
                Some(status) => {
                    tracing::warn!(url = %request_url, status, "Status reported as error, reading error body");
                    Ok(Recovery::ErrorBody(status))
                }
                None => Err(Error::Transport(other)),
            },
        }
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        // A future dropped mid-exchange was cancelled
        if !self.session.state.is_terminal() {
            self.set_state(State::Aborted);
        }
    }
}

/// Request URL with parameters appended; must be HTTP or HTTPS
pub(crate) fn resolve_url(request: &Request) -> Result<Url> {
    let full = request
        .url()
        .filter(|u| !u.trim().is_empty())
        .and_then(|_| request.url_with_query())
        .ok_or_else(|| Error::config("Cannot execute a request that has no URL specified"))?;
    let url = Url::parse(&full)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::config(format!(
            "Must be an HTTP or HTTPS based URL, got {}",
            scheme
        ))),
    }
}

/// URL with its last path segment removed
fn base_url(url: &Url) -> String {
    match url.join(BASE_REFERENCE) {
        Ok(joined) => {
            let joined = joined.to_string();
            joined
                .strip_suffix(BASE_REFERENCE)
                .map(String::from)
                .unwrap_or(joined)
        }
        Err(_) => url.to_string(),
    }
}

fn not_found(message: impl Into<String>, base_url: String) -> Response {
    Response::new(
        StatusCode::NOT_FOUND,
        message,
        HeaderSet::new(),
        Bytes::new(),
        None,
        base_url,
    )
}

/// Decompress a gzip body; an empty body stays empty (HEAD, 204, 304)
fn gunzip(body: &[u8]) -> Result<Bytes> {
    if body.is_empty() {
        return Ok(Bytes::new());
    }
    let mut decoded = Vec::new();
    MultiGzDecoder::new(body).read_to_end(&mut decoded)?;
    Ok(Bytes::from(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_strips_last_segment() {
        let url = Url::parse("http://example.com/a/b/page.html?x=1").unwrap();
        assert_eq!(base_url(&url), "http://example.com/a/b/");
        let root = Url::parse("http://example.com").unwrap();
        assert_eq!(base_url(&root), "http://example.com/");
    }

    #[test]
    fn test_gunzip_empty_body() {
        assert!(gunzip(b"").unwrap().is_empty());
        assert!(gunzip(b"not gzip").is_err());
    }

    #[test]
    fn test_resolve_url() {
        let req = Request::get("http://e.com/x?a=b+b&c=d+d");
        assert_eq!(
            resolve_url(&req).unwrap().as_str(),
            "http://e.com/x?a=b+b&c=d+d"
        );

        let err = resolve_url(&Request::new()).unwrap_err();
        assert!(err.is_config());
        let err = resolve_url(&Request::get("  ")).unwrap_err();
        assert!(err.is_config());
        let err = resolve_url(&Request::get("ftp://e.com/file")).unwrap_err();
        assert!(err.is_config());
    }
}

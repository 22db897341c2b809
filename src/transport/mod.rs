// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Transport seam between the session and the network
//!
//! A [`Transport`] opens one [`Connection`] per exchange. The connection
//! mirrors the life of a single HTTP exchange: write the request body,
//! connect to read the response head, then drain the response body.

mod http;
mod mock;

use std::fmt;
use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Method;
use thiserror::Error;
use url::Url;

use crate::http::BodyStream;
use crate::trust::TrustPolicy;

pub use self::http::{HttpClientConfig, HttpTransport};
pub use mock::{MockFailure, MockResponse, MockTransport, RecordedRequest};

lazy_static! {
    static ref EMBEDDED_STATUS: Regex =
        Regex::new(r"Server returned HTTP response code: (\d{3})").expect("valid regex");
}

/// Failure reported by a transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The exchange must be retried (e.g. a redirect could not be followed)
    #[error("HttpRetryException: {0}")]
    Retry(String),

    /// The host name could not be resolved
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// No success body; the error body should be read instead
    #[error("Resource not found")]
    NotFound,

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The exchange was interrupted
    #[error("Interrupted")]
    Interrupted,
}

impl TransportError {
    /// Status code embedded in an I/O error message, if any
    pub fn embedded_status(&self) -> Option<u16> {
        match self {
            TransportError::Io(e) => EMBEDDED_STATUS
                .captures(&e.to_string())
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok()),
            _ => None,
        }
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        TransportError::Io(io::Error::new(io::ErrorKind::Other, msg.into()))
    }
}

/// Everything a transport needs to open a connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub method: Method,
    pub follow_redirects: bool,
    /// Request headers in order, already including any cookies
    pub headers: Vec<(String, String)>,
    /// Trust policy for HTTPS connections
    pub trust: Option<TrustPolicy>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            follow_redirects: true,
            headers: Vec::new(),
            trust: None,
        }
    }
}

/// Status line and headers of a response
#[derive(Debug, Clone, Default)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: Option<String>,
    /// Raw headers in arrival order; names may repeat
    pub headers: Vec<(String, String)>,
    pub content_length: Option<u64>,
    pub content_encoding: Option<String>,
}

/// Opens connections
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn open(
        &self,
        url: &Url,
        options: ConnectOptions,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// One HTTP exchange
#[async_trait]
pub trait Connection: Send {
    /// Write a chunk of the request body, opening the output on first use
    async fn write(&mut self, chunk: Bytes) -> Result<(), TransportError>;

    /// Signal the end of the request body
    async fn close_output(&mut self) -> Result<(), TransportError>;

    /// Finish sending and read the response head
    async fn connect(&mut self) -> Result<ResponseHead, TransportError>;

    /// Response body; `Err(NotFound)` when only an error body exists
    async fn body(&mut self) -> Result<BodyStream, TransportError>;

    /// Body sent along with an error status, if the transport kept one
    fn error_body(&mut self) -> Option<BodyStream>;

    /// Head received before `connect` failed, if the transport kept one
    fn received_head(&self) -> Option<ResponseHead> {
        None
    }
}

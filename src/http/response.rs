// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP response model

use bytes::Bytes;
use encoding_rs::Encoding;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::header::{Header, HeaderSet};
use super::headers;
use crate::error::{Error, Result};

/// A completed HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    /// Response status code
    pub status: StatusCode,
    /// Status text, either the server's reason phrase or a diagnostic
    pub status_text: String,
    /// Raw, already decompressed body
    pub body: Bytes,
    /// Charset declared by the `Content-Type` header
    pub charset: Option<String>,
    /// Response headers
    pub headers: HeaderSet,
    /// URL relative links in the body resolve against
    pub base_url: String,
}

impl Response {
    /// Create a new response
    pub fn new(
        status: StatusCode,
        status_text: impl Into<String>,
        headers: HeaderSet,
        body: Bytes,
        charset: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body,
            charset,
            headers,
            base_url: base_url.into(),
        }
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if status is redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// Check if status is client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Check if status is server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Get status code as u16
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Body decoded with the response charset (UTF-8 when none is declared)
    pub fn text(&self) -> String {
        let charset = self.charset.as_deref().unwrap_or(super::DEFAULT_CHARSET);
        decode_text(&self.body, charset)
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    /// Get a header
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.get(name)
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.headers.value(headers::CONTENT_TYPE)
    }

    /// Check if content type is HTML
    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(false)
    }

    /// Check if content type is JSON
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }

    /// Declared content length
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .value(headers::CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Get body length
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Get raw body bytes
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }
}

pub(crate) fn decode_text(bytes: &[u8], charset: &str) -> String {
    let label = charset.trim();
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => {
            tracing::warn!(charset = %label, "Unsupported charset, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP request model

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use url::form_urlencoded;

use super::body::Body;
use super::header::{Header, HeaderSet, Parameter};
use super::headers;
use crate::error::Result;

/// An HTTP request
///
/// Requests are plain values. The URL is stored without its query string;
/// query parameters live in the parameter list and are appended again when
/// the request is executed.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Option<String>,
    headers: HeaderSet,
    parameters: Vec<Parameter>,
    body: Option<Body>,
    follow_redirects: bool,
    username: Option<String>,
    password: Option<String>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Create a GET request without a URL
    pub fn new() -> Self {
        let mut defaults = HeaderSet::new();
        defaults.set(Header::new(headers::ACCEPT_ENCODING, "gzip"));
        defaults.set(Header::new(
            headers::CONTENT_TYPE,
            format!("text/plain; charset={}", super::DEFAULT_CHARSET),
        ));
        Self {
            method: Method::GET,
            url: None,
            headers: defaults,
            parameters: Vec::new(),
            body: None,
            follow_redirects: true,
            username: None,
            password: None,
        }
    }

    /// Create a request with the given method and URL
    pub fn with_method(method: Method, url: impl AsRef<str>) -> Self {
        let mut request = Self::new();
        request.method = method;
        request.set_url(url);
        request
    }

    /// Create a GET request
    pub fn get(url: impl AsRef<str>) -> Self {
        Self::with_method(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(url: impl AsRef<str>) -> Self {
        Self::with_method(Method::POST, url)
    }

    /// Create a PUT request
    pub fn put(url: impl AsRef<str>) -> Self {
        Self::with_method(Method::PUT, url)
    }

    // Builder-style setters

    /// Set a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(Header::new(name, value));
        self
    }

    /// Set a parameter
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a plain text body
    pub fn text(self, text: impl Into<String>) -> Self {
        self.header(
            headers::CONTENT_TYPE,
            format!("text/plain; charset={}", super::DEFAULT_CHARSET),
        )
        .body(text.into())
    }

    /// Set a binary body
    pub fn bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.header(headers::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.into())
    }

    /// Set a JSON body
    pub fn json<T: Serialize>(self, data: &T) -> Result<Self> {
        let json = serde_json::to_vec(data)?;
        Ok(self
            .header(headers::CONTENT_TYPE, "application/json")
            .body(json))
    }

    /// Set follow redirects
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set basic credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self.set_username(Some(username.into()));
        self
    }

    // Accessors

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// URL without its query string
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Set the URL.
    ///
    /// A query string is split off and each of its pairs becomes a
    /// parameter (`+` and percent escapes decoded as UTF-8).
    pub fn set_url(&mut self, url: impl AsRef<str>) {
        let url = url.as_ref();
        match url.split_once('?') {
            Some((base, query)) => {
                self.url = Some(base.to_string());
                for (name, value) in form_urlencoded::parse(query.as_bytes()) {
                    self.set_parameter(name, value);
                }
            }
            None => self.url = Some(url.to_string()),
        }
    }

    pub fn clear_url(&mut self) {
        self.url = None;
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Look up a header (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&Header> {
        self.headers.get(name)
    }

    /// Set a header, returning the one it replaced.
    ///
    /// Setting `Authentication` to a Basic credential also sets the
    /// username and password.
    pub fn set_header(&mut self, header: Header) -> Option<Header> {
        if header.is(headers::AUTHENTICATION) {
            if let Some((user, pass)) = decode_basic(header.value()) {
                self.username = Some(user);
                self.password = Some(pass);
            }
        }
        self.headers.set(header)
    }

    /// Remove a header by name
    pub fn remove_header(&mut self, name: &str) -> Option<Header> {
        self.headers.remove(name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Set a parameter, replacing one with the same name in place
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let param = Parameter::new(name, value);
        match self.parameters.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.parameters.push(param),
        }
    }

    /// Append a parameter, keeping any with the same name
    pub fn push_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.push(Parameter::new(name, value));
    }

    pub fn remove_parameter(&mut self, name: &str) -> Option<Parameter> {
        let index = self.parameters.iter().position(|p| p.name == name)?;
        Some(self.parameters.remove(index))
    }

    pub fn body_source(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Option<Body>) {
        self.body = body;
    }

    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn set_follow_redirects(&mut self, follow: bool) {
        self.follow_redirects = follow;
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Set the username; the `Authentication` header follows it
    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
        self.sync_authentication();
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Set the password; the header is only written once a username exists
    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password;
        self.sync_authentication();
    }

    fn sync_authentication(&mut self) {
        match &self.username {
            Some(user) => {
                let credential = format!("{}:{}", user, self.password.as_deref().unwrap_or(""));
                self.headers.set(Header::new(
                    headers::AUTHENTICATION,
                    format!("Basic {}", STANDARD.encode(credential)),
                ));
            }
            None => {
                self.headers.remove(headers::AUTHENTICATION);
            }
        }
    }

    /// URL with the parameters appended as a form-encoded query string
    pub fn url_with_query(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        if self.parameters.is_empty() {
            return Some(url.to_string());
        }
        let query = self
            .parameters
            .iter()
            .map(|p| {
                format!(
                    "{}={}",
                    form_urlencoded::byte_serialize(p.name.as_bytes()).collect::<String>(),
                    form_urlencoded::byte_serialize(p.value.as_bytes()).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        Some(format!("{}?{}", url, query))
    }
}

fn decode_basic(value: &str) -> Option<(String, String)> {
    let payload = value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

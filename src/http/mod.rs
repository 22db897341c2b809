// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request/response model for Courier
//!
//! Requests, responses, headers, body sources and the cookie jar. Nothing
//! in this module performs I/O except opening file-backed bodies.

mod body;
mod cookie;
mod header;
mod request;
mod response;

pub use body::{collect, Body, BodySource, BodyStream};
pub use cookie::{Cookie, CookieJar};
pub use header::{Header, HeaderElement, HeaderSet, Parameter};
pub use request::Request;
pub use response::Response;

pub(crate) use body::{bytes_stream, file_stream};

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Size of the chunks request bodies are written in
pub const CHUNK_SIZE: usize = 8096;

/// Charset assumed when a response declares none
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Header names used by the session
pub mod headers {
    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
    /// Carries Basic credentials mirrored from a request's username/password
    pub const AUTHENTICATION: &str = "Authentication";
    pub const CONTENT_ENCODING: &str = "Content-Encoding";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const COOKIE: &str = "Cookie";
    pub const SET_COOKIE: &str = "Set-Cookie";
    pub const USER_AGENT: &str = "User-Agent";
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Courier - HTTP Session Client
//!
//! Session based HTTP client with streaming progress, cookie handling,
//! pluggable TLS trust and an asynchronous request lifecycle.
//!
//! ## Features
//!
//! - Sessions: sequential request/response exchanges with state tracking
//! - Progress: byte counts for upload and download, per phase
//! - Trust policy: LOW / MEDIUM / HIGH certificate handling with a decider
//!   hook for unknown certificates
//! - Cookies: `Set-Cookie` parsing, domain matching and a shared jar
//! - Error recovery: unknown hosts and redirect retries become 404 responses
//! - Services: background exchanges with ordered, batched listener
//!   notifications and single-flight send/abort
//! - Forms: url-encoded and streamed multipart submissions
//!
//! ## Example
//!
//! ```rust,no_run
//! use courier::{Request, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = Session::new()?;
//!
//!     let request = Request::get("https://example.com/search").parameter("q", "rust");
//!     let response = session.execute(&request).await?;
//!
//!     println!("{} {}", response.status_code(), response.status_text);
//!     println!("{}", response.text());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod form;
pub mod http;
pub mod service;
pub mod session;
pub mod transport;
pub mod trust;

// Re-exports for convenience

// Errors
pub use error::{Error, ErrorContext, Result};

// HTTP model
pub use http::{
    Body, BodySource, Cookie, CookieJar, Header, HeaderElement, HeaderSet, Parameter, Request,
    Response,
};

// Session
pub use session::{ExchangeObserver, Session, SessionConfig, State, StateControl};

// Services
pub use service::{
    HttpService, JsonDecoder, ListenerId, Passthrough, ResponseDecoder, Service, ServiceCore,
    TextDecoder,
};

// Forms
pub use form::{Encoding, FileParameter, Form, FormParameter, FormRequest, Input};

// Transport
pub use transport::{
    Connection, HttpClientConfig, HttpTransport, MockResponse, MockTransport, Transport,
    TransportError,
};

// Trust
pub use trust::{AcceptUnknown, RejectUnknown, SecurityLevel, TrustDecider, TrustPolicy};

/// Courier version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

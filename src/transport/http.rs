// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! reqwest-backed transport

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use tokio::task::JoinHandle;
use url::Url;

use super::{ConnectOptions, Connection, ResponseHead, Transport, TransportError};
use crate::error::{Error, Result};
use crate::http::{headers, BodyStream, DEFAULT_USER_AGENT};
use crate::trust::{SecurityLevel, TrustPolicy};

/// Chunks buffered between the session and the in-flight request
const UPLOAD_BUFFER: usize = 4;

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Whole-exchange timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Maximum redirects to follow when a request follows redirects
    pub max_redirects: usize,
    /// Proxy URL
    pub proxy: Option<String>,
    /// Headers sent with every request unless the request sets them
    pub default_headers: HeaderMap,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            proxy: None,
            default_headers: HeaderMap::new(),
        }
    }
}

impl HttpClientConfig {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }
}

/// Clients differ by redirect handling and TLS trust
type ClientKey = (bool, Option<(SecurityLevel, usize)>);

/// Transport over reqwest
///
/// reqwest clients are built lazily and shared between connections with
/// the same redirect mode and trust policy.
#[derive(Debug)]
pub struct HttpTransport {
    config: HttpClientConfig,
    clients: DashMap<ClientKey, Client>,
}

impl HttpTransport {
    /// Create a transport with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let transport = Self {
            config,
            clients: DashMap::new(),
        };
        // Surface bad proxy URLs and the like at construction
        let client = transport.build_client(true, None)?;
        transport.clients.insert((true, None), client);
        Ok(transport)
    }

    /// Get transport configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn build_client(&self, follow_redirects: bool, trust: Option<&TrustPolicy>) -> Result<Client> {
        let redirect = if follow_redirects {
            Policy::limited(self.config.max_redirects)
        } else {
            Policy::none()
        };

        let mut builder = Client::builder()
            .user_agent(&self.config.user_agent)
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .redirect(redirect)
            .default_headers(self.config.default_headers.clone())
            .no_gzip();

        if let Some(policy) = trust {
            builder = builder.use_preconfigured_tls(policy.client_config()?);
        }

        if let Some(ref proxy_url) = self.config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?,
            );
        }

        Ok(builder.build()?)
    }

    fn client(&self, follow_redirects: bool, trust: Option<&TrustPolicy>) -> Result<Client> {
        let key = (follow_redirects, trust.map(TrustPolicy::cache_key));
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }
        let client = self.build_client(follow_redirects, trust)?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        url: &Url,
        options: ConnectOptions,
    ) -> std::result::Result<Box<dyn Connection>, TransportError> {
        let client = self
            .client(options.follow_redirects, options.trust.as_ref())
            .map_err(|e| TransportError::other(e.to_string()))?;

        let mut request = client.request(options.method.clone(), url.clone());
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::info!(method = %options.method, url = %url, "Request");
        Ok(Box::new(HttpConnection {
            request: Some(request),
            upload: None,
            pending: None,
            response: None,
        }))
    }
}

type PendingResponse = JoinHandle<reqwest::Result<reqwest::Response>>;

struct HttpConnection {
    request: Option<RequestBuilder>,
    upload: Option<mpsc::Sender<io::Result<Bytes>>>,
    pending: Option<PendingResponse>,
    response: Option<reqwest::Response>,
}

impl HttpConnection {
    /// Start the request, streaming its body from a channel when `with_body`
    fn dispatch(&mut self, with_body: bool) -> std::result::Result<(), TransportError> {
        let mut request = self
            .request
            .take()
            .ok_or_else(|| TransportError::other("request already dispatched"))?;
        if with_body {
            let (tx, rx) = mpsc::channel(UPLOAD_BUFFER);
            request = request.body(reqwest::Body::wrap_stream(rx));
            self.upload = Some(tx);
        }
        self.pending = Some(tokio::spawn(request.send()));
        Ok(())
    }

    async fn await_pending(&mut self) -> std::result::Result<reqwest::Response, TransportError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| TransportError::other("request not dispatched"))?;
        match pending.await {
            Ok(result) => result.map_err(classify),
            Err(e) if e.is_cancelled() => Err(TransportError::Interrupted),
            Err(e) => Err(TransportError::other(e.to_string())),
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn write(&mut self, chunk: Bytes) -> std::result::Result<(), TransportError> {
        if self.pending.is_none() {
            self.dispatch(true)?;
        }
        let upload = self
            .upload
            .as_mut()
            .ok_or_else(|| TransportError::other("output already closed"))?;
        if upload.send(Ok(chunk)).await.is_err() {
            // The request gave up reading; report why
            self.upload = None;
            return match self.await_pending().await {
                Err(e) => Err(e),
                Ok(response) => {
                    self.response = Some(response);
                    Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "server stopped reading the request body",
                    )))
                }
            };
        }
        Ok(())
    }

    async fn close_output(&mut self) -> std::result::Result<(), TransportError> {
        if let Some(mut upload) = self.upload.take() {
            let _ = upload.close().await;
        }
        Ok(())
    }

    async fn connect(&mut self) -> std::result::Result<ResponseHead, TransportError> {
        self.upload = None;
        if self.response.is_none() {
            if self.pending.is_none() {
                self.dispatch(false)?;
            }
            self.response = Some(self.await_pending().await?);
        }
        let response = self
            .response
            .as_ref()
            .ok_or_else(|| TransportError::other("no response"))?;

        let status = response.status();
        let raw_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let content_encoding = response
            .headers()
            .get(headers::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());

        tracing::info!(status = status.as_u16(), url = %response.url(), "Response");
        Ok(ResponseHead {
            status: status.as_u16(),
            reason: status.canonical_reason().map(String::from),
            headers: raw_headers,
            content_length: response.content_length(),
            content_encoding,
        })
    }

    async fn body(&mut self) -> std::result::Result<BodyStream, TransportError> {
        let response = self
            .response
            .take()
            .ok_or_else(|| TransportError::other("response body already taken"))?;
        Ok(response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .boxed())
    }

    fn error_body(&mut self) -> Option<BodyStream> {
        // reqwest hands error responses back as ordinary responses
        None
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

/// Map a reqwest failure onto the transport error classes
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_redirect() {
        return TransportError::Retry(err.to_string());
    }
    if is_dns_failure(&err) {
        let host = err
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or_default()
            .to_string();
        return TransportError::UnknownHost(host);
    }
    let kind = if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Io(io::Error::new(kind, err))
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string().to_ascii_lowercase();
        if msg.contains("dns error")
            || msg.contains("failed to lookup address")
            || msg.contains("name or service not known")
            || msg.contains("no such host")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.config().user_agent, DEFAULT_USER_AGENT);
        assert_eq!(transport.clients.len(), 1);
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let config = HttpClientConfig::default().proxy("not a proxy url ::");
        let err = HttpTransport::with_config(config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_clients_cached_per_policy() {
        let transport = HttpTransport::new().unwrap();
        let policy = TrustPolicy::new(SecurityLevel::High);
        transport.client(true, Some(&policy)).unwrap();
        transport.client(true, Some(&policy)).unwrap();
        transport.client(false, None).unwrap();
        assert_eq!(transport.clients.len(), 3);
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie parsing and the shared cookie jar

use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use super::header::{split_unquoted, unquote};
use crate::error::Error;

/// Legacy `expires` layouts still sent by real servers
const EXPIRES_FORMATS: &[&str] = &[
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%A, %d-%b-%Y %H:%M:%S GMT",
    "%a, %d-%b-%y %H:%M:%S GMT",
    "%a %b %d %H:%M:%S %Y GMT",
    "%a, %d %b %Y %H:%M:%S GMT",
];

/// A single HTTP cookie
///
/// Cookies are values: the jar replaces them wholesale rather than
/// mutating them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie belongs to, with a leading dot when known
    pub domain: String,
    /// Path the cookie is valid for
    pub path: String,
    /// Secure flag (HTTPS only)
    pub secure: bool,
    /// HttpOnly flag
    pub http_only: bool,
    /// Cookie version attribute
    pub version: u32,
    /// Expiration time (None = session cookie)
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    /// Create a new cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            version: 0,
            expires: None,
        }
    }

    /// Set the domain, normalized to a leading dot
    pub fn domain(mut self, domain: impl AsRef<str>) -> Self {
        self.domain = normalize_domain(domain.as_ref());
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set secure flag
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set expiration time
    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Check if the cookie is expired
    pub fn is_expired(&self) -> bool {
        self.expires.map_or(false, |exp| exp < Utc::now())
    }

    /// Check if the cookie should be sent to the given URL
    pub fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or("");
        self.domain_matches(host)
            && url.path().starts_with(&self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired()
    }

    fn domain_matches(&self, host: &str) -> bool {
        if self.domain.is_empty() {
            return true;
        }
        let bare = self.domain.trim_start_matches('.');
        host.eq_ignore_ascii_case(bare)
            || host
                .to_ascii_lowercase()
                .ends_with(&self.domain.to_ascii_lowercase())
    }

    /// Parse a `Set-Cookie` header value.
    ///
    /// Whitespace around `=` and `;` is ignored and `;` inside double quotes
    /// does not end an attribute. A cookie without a `domain` attribute has
    /// an empty domain; see [`Cookie::parse_for`].
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = split_unquoted(header, ';').into_iter();
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, value.trim());

        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (attr, val) = match part.split_once('=') {
                Some((a, v)) => (a.trim(), unquote(v.trim())),
                None => (part, ""),
            };
            match attr.to_ascii_lowercase().as_str() {
                "domain" => cookie.domain = normalize_domain(val),
                "path" => cookie.path = val.to_string(),
                "expires" => {
                    if let Some(expires) = parse_expires(val) {
                        cookie.expires = Some(expires);
                    }
                }
                "max-age" => {
                    if let Ok(secs) = val.parse::<i64>() {
                        cookie.expires = Some(Utc::now() + chrono::Duration::seconds(secs));
                    }
                }
                "version" => cookie.version = val.parse().unwrap_or(0),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        Some(cookie)
    }

    /// Parse a `Set-Cookie` header received from `url`.
    ///
    /// A missing domain defaults to the request host with a leading dot.
    pub fn parse_for(header: &str, url: &Url) -> Option<Self> {
        let mut cookie = Self::parse(header)?;
        if cookie.domain.is_empty() {
            if let Some(host) = url.host_str() {
                cookie.domain = normalize_domain(host);
            }
        }
        Some(cookie)
    }

    /// Convert to cookie header format
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl FromStr for Cookie {
    type Err = Error;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        Self::parse(header)
            .ok_or_else(|| Error::Cookie(format!("Malformed Set-Cookie header: {}", header)))
    }
}

/// Lowercase with a leading dot; host names compare case-insensitively
fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().to_ascii_lowercase();
    if domain.is_empty() || domain.starts_with('.') {
        domain
    } else {
        format!(".{}", domain)
    }
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    EXPIRES_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Thread-safe cookie storage shared by the sessions that own a handle to it
#[derive(Debug, Clone)]
pub struct CookieJar {
    /// Cookies stored by domain
    cookies: Arc<DashMap<String, Vec<Cookie>>>,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    /// Create a new empty cookie jar
    pub fn new() -> Self {
        Self {
            cookies: Arc::new(DashMap::new()),
        }
    }

    /// Add a cookie, replacing one with the same name in the same domain
    pub fn add(&self, mut cookie: Cookie) {
        cookie.domain = normalize_domain(&cookie.domain);
        let mut entry = self.cookies.entry(cookie.domain.clone()).or_default();
        match entry.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => entry.push(cookie),
        }
    }

    /// Add a cookie from a `Set-Cookie` header received from `url`
    pub fn add_from_header(&self, header: &str, url: &Url) -> bool {
        match Cookie::parse_for(header, url) {
            Some(cookie) => {
                tracing::debug!(name = %cookie.name, domain = %cookie.domain, "Storing cookie");
                self.add(cookie);
                true
            }
            None => {
                tracing::debug!(header = %header, "Ignoring malformed Set-Cookie");
                false
            }
        }
    }

    /// Get all live cookies for a URL
    pub fn cookies_for(&self, url: &Url) -> Vec<Cookie> {
        self.remove_expired();
        self.cookies
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|c| c.matches(url))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Get the `Cookie` header value for a URL
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.cookies_for(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(Cookie::to_header_value)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Look up a cookie by name and domain
    pub fn get(&self, name: &str, domain: &str) -> Option<Cookie> {
        let domain = normalize_domain(domain);
        self.cookies
            .get(&domain)
            .and_then(|cookies| cookies.iter().find(|c| c.name == name).cloned())
    }

    /// Remove a specific cookie
    pub fn remove(&self, name: &str, domain: &str) {
        if let Some(mut cookies) = self.cookies.get_mut(&normalize_domain(domain)) {
            cookies.retain(|c| c.name != name);
        }
    }

    /// Clear all cookies
    pub fn clear(&self) {
        self.cookies.clear();
    }

    /// Clear cookies for a specific domain
    pub fn clear_domain(&self, domain: &str) {
        self.cookies.remove(&normalize_domain(domain));
    }

    fn remove_expired(&self) {
        for mut entry in self.cookies.iter_mut() {
            entry.value_mut().retain(|c| !c.is_expired());
        }
    }

    /// Get total cookie count
    pub fn len(&self) -> usize {
        self.cookies.iter().map(|e| e.value().len()).sum()
    }

    /// Check if jar is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export all cookies as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        let all: Vec<Cookie> = self
            .cookies
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        serde_json::to_string(&all)
    }

    /// Import cookies from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let cookies: Vec<Cookie> = serde_json::from_str(json)?;
        let jar = CookieJar::new();
        for cookie in cookies {
            jar.add(cookie);
        }
        Ok(jar)
    }
}

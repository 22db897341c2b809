// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Header and parameter types
//!
//! Header names are compared case-insensitively everywhere. A header's
//! value is additionally broken into structured [`HeaderElement`]s so that
//! callers can read sub-parameters such as the `charset` of a
//! `Content-Type` without re-parsing.

use std::fmt;

/// A name/value pair used for query and form parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One comma-separated element of a header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderElement {
    /// Element name, e.g. `text/html`
    pub name: String,
    /// Value when the element itself is `name=value`
    pub value: Option<String>,
    /// `;` separated parameters following the element
    pub params: Vec<Parameter>,
}

impl HeaderElement {
    /// Look up a parameter case-insensitively
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// Parse all elements of a header value.
    ///
    /// Separators inside double quotes are ignored and quoted values are
    /// unquoted.
    pub fn parse_all(value: &str) -> Vec<HeaderElement> {
        split_unquoted(value, ',')
            .into_iter()
            .filter_map(|raw| {
                let mut parts = split_unquoted(raw, ';').into_iter();
                let head = parts.next()?.trim();
                if head.is_empty() {
                    return None;
                }
                let (name, value) = split_pair(head);
                let params = parts
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| {
                        let (n, v) = split_pair(p);
                        Parameter::new(n, v.unwrap_or_default())
                    })
                    .collect();
                Some(HeaderElement { name, value, params })
            })
            .collect()
    }
}

/// An HTTP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
    elements: Vec<HeaderElement>,
}

impl Header {
    /// Create a header; elements are parsed from the value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let elements = HeaderElement::parse_all(&value);
        Self {
            name: name.into(),
            value,
            elements,
        }
    }

    /// Create a header with explicitly supplied elements
    pub fn with_elements(
        name: impl Into<String>,
        value: impl Into<String>,
        elements: Vec<HeaderElement>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            elements,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn elements(&self) -> &[HeaderElement] {
        &self.elements
    }

    /// Check whether this header has the given name (case-insensitive)
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// First element parameter with the given name, across all elements
    pub fn param(&self, name: &str) -> Option<&str> {
        self.elements.iter().find_map(|e| e.param(name))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Ordered set of headers, unique by case-insensitive name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: Vec<Header>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header by name
    pub fn get(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// Value of a header by name
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(Header::value)
    }

    /// Insert a header, replacing any header with the same name in place
    pub fn set(&mut self, header: Header) -> Option<Header> {
        match self.headers.iter_mut().find(|h| h.is(&header.name)) {
            Some(existing) => Some(std::mem::replace(existing, header)),
            None => {
                self.headers.push(header);
                None
            }
        }
    }

    /// Remove a header by name
    pub fn remove(&mut self, name: &str) -> Option<Header> {
        let index = self.headers.iter().position(|h| h.is(name))?;
        Some(self.headers.remove(index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

impl FromIterator<Header> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for header in iter {
            set.set(header);
        }
        set
    }
}

/// Split on `sep`, ignoring separators inside double quotes
pub(crate) fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split `name=value`, trimming both sides and unquoting the value
fn split_pair(s: &str) -> (String, Option<String>) {
    match s.split_once('=') {
        Some((n, v)) => (n.trim().to_string(), Some(unquote(v.trim()).to_string())),
        None => (s.trim().to_string(), None),
    }
}

pub(crate) fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

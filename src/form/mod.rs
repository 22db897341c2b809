// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTML form model and submission
//!
//! A [`Form`] is plain data: action, method, encoding and inputs, as found
//! on a page. Submitting it builds a [`FormRequest`] and runs it through a
//! [`Session`].

mod input;
mod request;

use std::fmt;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::http::{Parameter, Request, Response};
use crate::session::Session;

pub use input::{FileInput, Input};
pub use request::{
    content_type_for, FileParameter, FormParameter, FormRequest, BOUNDARY, UNKNOWN_CONTENT_TYPE,
};

/// How form parameters are written into the request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    UrlEncoded,
    MultipartFormData,
}

impl Encoding {
    pub fn content_type(self) -> &'static str {
        match self {
            Encoding::UrlEncoded => "application/x-www-form-urlencoded",
            Encoding::MultipartFormData => "multipart/form-data",
        }
    }

    /// Encoding named by an `enctype` attribute; url-encoded otherwise
    pub fn from_enctype(enctype: &str) -> Self {
        if enctype.trim().eq_ignore_ascii_case("multipart/form-data") {
            Encoding::MultipartFormData
        } else {
            Encoding::UrlEncoded
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

/// An HTML form
#[derive(Debug, Clone)]
pub struct Form {
    pub name: Option<String>,
    /// Target URL, absolute or relative to `base_url`
    pub action: String,
    pub method: Method,
    pub encoding: Encoding,
    /// URL of the page the form came from
    pub base_url: Option<String>,
    inputs: Vec<Input>,
}

impl Form {
    /// GET, url-encoded form with no inputs
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            name: None,
            action: action.into(),
            method: Method::GET,
            encoding: Encoding::UrlEncoded,
            base_url: None,
            inputs: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// First input called `name`
    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.name() == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut Input> {
        self.inputs.iter_mut().find(|i| i.name() == name)
    }

    /// Set the value of the input called `name`
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.input_mut(name)
            .ok_or_else(|| Error::form(format!("Form has no input named '{}'", name)))?
            .set_value(value)
    }

    /// Inputs that have both a name and a value
    pub fn parameters(&self) -> Vec<Parameter> {
        self.inputs
            .iter()
            .filter(|i| !i.name().is_empty())
            .filter_map(|i| Some(Parameter::new(i.name(), i.value()?)))
            .collect()
    }

    /// Absolute URL the form submits to
    ///
    /// An absolute action is used as is; anything else is resolved against
    /// the base URL.
    pub fn resolve_action(&self) -> Result<Url> {
        if let Ok(url) = Url::parse(&self.action) {
            return Ok(url);
        }
        self.base_url
            .as_deref()
            .and_then(|base| Url::parse(base).ok())
            .and_then(|base| base.join(&self.action).ok())
            .ok_or_else(|| {
                Error::form_with_action(
                    format!(
                        "The action url '{}' does not form a valid url, even when combined with the base url '{}'",
                        self.action,
                        self.base_url.as_deref().unwrap_or_default()
                    ),
                    self.action.clone(),
                )
            })
    }

    /// Form request carrying every input
    pub fn to_form_request(&self) -> Result<FormRequest> {
        let action = self.resolve_action()?;
        let mut form = FormRequest::with_url(action.as_str());
        form.set_method(self.method.clone());
        form.set_encoding(self.encoding);

        for input in &self.inputs {
            if input.name().is_empty() {
                continue;
            }
            match input {
                Input::File(file) => {
                    let mut param = FileParameter::new(&file.name, "");
                    param.set_path(file.path.clone());
                    if let Some(content_type) = &file.content_type {
                        param.set_content_type(Some(content_type.clone()));
                    }
                    form.add(param);
                }
                other => {
                    if let Some(value) = other.value() {
                        form.add(Parameter::new(other.name(), value));
                    }
                }
            }
        }
        Ok(form)
    }

    /// Request that submits the form
    pub fn to_request(&self) -> Result<Request> {
        Ok(self.to_form_request()?.to_request())
    }

    /// Submit the form through `session`
    pub async fn submit(&self, session: &mut Session) -> Result<Response> {
        let request = self.to_request()?;
        tracing::info!(
            form = self.name.as_deref().unwrap_or_default(),
            method = %self.method,
            "Submitting form"
        );
        session.execute(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockResponse, MockTransport};
    use std::sync::Arc;

    fn login_form() -> Form {
        Form::new("login")
            .name("login")
            .method(Method::POST)
            .base_url("http://example.com/account/index.html?from=home")
            .with_input(Input::text("user", "jane"))
            .with_input(Input::Text {
                name: "comment".into(),
                value: None,
            })
            .with_input(Input::select("lang", ["en", "fi"]))
    }

    #[test]
    fn test_resolve_action() {
        let form = login_form();
        assert_eq!(
            form.resolve_action().unwrap().as_str(),
            "http://example.com/account/login"
        );

        let rooted = Form::new("/auth").base_url("https://example.com/a/b");
        assert_eq!(
            rooted.resolve_action().unwrap().as_str(),
            "https://example.com/auth"
        );

        let absolute = Form::new("http://other.example/submit");
        assert_eq!(
            absolute.resolve_action().unwrap().as_str(),
            "http://other.example/submit"
        );

        let err = Form::new("relative").resolve_action().unwrap_err();
        assert_eq!(err.action(), Some("relative"));
    }

    #[test]
    fn test_parameters_skip_empty_values() {
        let mut form = login_form();
        let names: Vec<String> = form.parameters().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["user"]);

        form.set_value("lang", "fi").unwrap();
        assert_eq!(form.parameters().len(), 2);
        assert!(form.set_value("lang", "sv").is_err());
        assert!(form.set_value("missing", "x").is_err());
    }

    #[test]
    fn test_encoding_from_enctype() {
        assert_eq!(
            Encoding::from_enctype("Multipart/Form-Data"),
            Encoding::MultipartFormData
        );
        assert_eq!(Encoding::from_enctype("text/plain"), Encoding::UrlEncoded);
        assert_eq!(
            Encoding::MultipartFormData.to_string(),
            "multipart/form-data"
        );
    }

    #[test]
    fn test_to_request_multipart_content_type() {
        let form = login_form().encoding(Encoding::MultipartFormData);
        let request = form.to_request().unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert!(request
            .get_header("Content-Type")
            .unwrap()
            .value()
            .ends_with(BOUNDARY));
    }

    #[tokio::test]
    async fn test_submit_posts_url_encoded() {
        let transport = MockTransport::with_response(MockResponse::new().body("welcome"));
        let mut session = Session::with_transport(Arc::new(transport.clone()));

        let response = login_form().submit(&mut session).await.unwrap();
        assert_eq!(response.text(), "welcome");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.url.as_str(), "http://example.com/account/login");
        assert_eq!(sent.body, b"user=jane");
        assert_eq!(
            sent.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[tokio::test]
    async fn test_submit_get_uses_query() {
        let transport = MockTransport::new();
        let mut session = Session::with_transport(Arc::new(transport.clone()));
        let form = Form::new("http://example.com/search").with_input(Input::text("q", "a b"));

        form.submit(&mut session).await.unwrap();
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url.as_str(), "http://example.com/search?q=a+b");
        assert!(sent.body.is_empty());
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Form submissions: url-encoded and multipart bodies

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Method;
use url::form_urlencoded;

use super::Encoding;
use crate::http::{
    bytes_stream, file_stream, headers, Body, BodySource, BodyStream, Header, Parameter, Request,
};

/// Boundary between the parts of a multipart body
pub const BOUNDARY: &str = "++-----------------------7d44e178b043433ff";

/// Content type of files whose extension is not recognized
pub const UNKNOWN_CONTENT_TYPE: &str = "content/unknown";

/// Content type for a file name, guessed from its extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("txt" | "text" | "java" | "c" | "h" | "rs") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg" | "jpeg" | "jpe") => "image/jpeg",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/x-gzip",
        Some("tar") => "application/x-tar",
        Some("jar") => "application/java-archive",
        Some("doc") => "application/msword",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/x-wav",
        Some("mpg" | "mpeg") => "video/mpeg",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        _ => UNKNOWN_CONTENT_TYPE,
    }
}

/// A file to upload
///
/// The file is opened only when the request body reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileParameter {
    name: String,
    path: Option<PathBuf>,
    content_type: String,
    content_type_set: bool,
}

impl FileParameter {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let mut param = Self {
            name: name.into(),
            path: None,
            content_type: UNKNOWN_CONTENT_TYPE.to_string(),
            content_type_set: false,
        };
        param.set_path(Some(path.into()));
        param
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Change the file; the content type follows unless it was set by hand
    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
        if !self.content_type_set {
            self.content_type = self
                .file_name()
                .map(content_type_for)
                .unwrap_or(UNKNOWN_CONTENT_TYPE)
                .to_string();
        }
    }

    /// File name sent with the part: the last component of the path
    pub fn file_name(&self) -> Option<&str> {
        self.path.as_deref()?.file_name()?.to_str()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Override the guessed content type; `None` goes back to unknown
    pub fn set_content_type(&mut self, content_type: Option<String>) {
        self.content_type_set = content_type.is_some();
        self.content_type = content_type.unwrap_or_else(|| UNKNOWN_CONTENT_TYPE.to_string());
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.set_content_type(Some(content_type.into()));
        self
    }
}

/// A value submitted with a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormParameter {
    Field(Parameter),
    File(FileParameter),
}

impl FormParameter {
    pub fn name(&self) -> &str {
        match self {
            FormParameter::Field(p) => &p.name,
            FormParameter::File(f) => f.name(),
        }
    }

    /// Plain value; the file name for files
    pub fn value(&self) -> Option<&str> {
        match self {
            FormParameter::Field(p) => Some(&p.value),
            FormParameter::File(f) => f.file_name(),
        }
    }
}

impl From<Parameter> for FormParameter {
    fn from(param: Parameter) -> Self {
        FormParameter::Field(param)
    }
}

impl From<FileParameter> for FormParameter {
    fn from(param: FileParameter) -> Self {
        FormParameter::File(param)
    }
}

/// Request carrying form parameters in its body
///
/// POST and url-encoded unless told otherwise. Form parameters keep their
/// order and may repeat.
#[derive(Debug, Clone)]
pub struct FormRequest {
    request: Request,
    params: Vec<FormParameter>,
    encoding: Encoding,
}

impl Default for FormRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl FormRequest {
    pub fn new() -> Self {
        let mut request = Request::new();
        request.set_method(Method::POST);
        let mut form = Self {
            request,
            params: Vec::new(),
            encoding: Encoding::UrlEncoded,
        };
        form.set_encoding(Encoding::UrlEncoded);
        form
    }

    /// Form request posting to `url`
    pub fn with_url(url: impl AsRef<str>) -> Self {
        let mut form = Self::new();
        form.request.set_url(url);
        form
    }

    /// Underlying request: method, URL, headers, credentials
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn set_method(&mut self, method: Method) {
        self.request.set_method(method);
    }

    pub fn set_url(&mut self, url: impl AsRef<str>) {
        self.request.set_url(url);
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Change the encoding and rewrite `Content-Type` to match
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
        let content_type = match encoding {
            Encoding::UrlEncoded => encoding.content_type().to_string(),
            Encoding::MultipartFormData => {
                format!("{}; boundary={}", encoding.content_type(), BOUNDARY)
            }
        };
        self.request
            .set_header(Header::new(headers::CONTENT_TYPE, content_type));
    }

    pub fn encoding_with(mut self, encoding: Encoding) -> Self {
        self.set_encoding(encoding);
        self
    }

    /// Multipart boundary, when multipart encoded
    pub fn boundary(&self) -> Option<&'static str> {
        (self.encoding == Encoding::MultipartFormData).then_some(BOUNDARY)
    }

    /// Append a plain value
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(Parameter::new(name, value));
        self
    }

    /// Append a file
    pub fn file(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.add(FileParameter::new(name, path));
        self
    }

    pub fn add(&mut self, param: impl Into<FormParameter>) {
        self.params.push(param.into());
    }

    /// First parameter called `name`
    pub fn form_parameter(&self, name: &str) -> Option<&FormParameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn form_parameters(&self) -> &[FormParameter] {
        &self.params
    }

    /// Replace every form parameter
    pub fn set_form_parameters<I>(&mut self, params: I)
    where
        I: IntoIterator,
        I::Item: Into<FormParameter>,
    {
        self.params = params.into_iter().map(Into::into).collect();
    }

    /// Request ready for a session
    ///
    /// GET forms travel as query parameters; everything else becomes the
    /// body in the current encoding.
    pub fn to_request(&self) -> Request {
        let mut request = self.request.clone();
        if *request.method() == Method::GET {
            for param in &self.params {
                if let Some(value) = param.value() {
                    request.push_parameter(param.name(), value);
                }
            }
            request.set_body(None);
            return request;
        }

        let body = match self.encoding {
            Encoding::UrlEncoded => Body::Bytes(self.url_encoded()),
            Encoding::MultipartFormData => Body::Source(Arc::new(self.multipart())),
        };
        request.set_body(Some(body));
        request
    }

    fn url_encoded(&self) -> Bytes {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for param in &self.params {
            serializer.append_pair(param.name(), param.value().unwrap_or_default());
        }
        Bytes::from(serializer.finish())
    }

    fn multipart(&self) -> MultipartBody {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut first = true;

        for param in &self.params {
            let file = match param {
                FormParameter::File(file) => match (file.file_name(), file.path()) {
                    (Some(file_name), Some(path)) => Some((file, file_name, path)),
                    // Nothing chosen, nothing sent
                    _ => continue,
                },
                FormParameter::Field(_) => None,
            };

            if !first {
                text.push_str("\r\n");
            }
            first = false;
            text.push_str("--");
            text.push_str(BOUNDARY);
            text.push_str("\r\n");
            text.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"",
                param.name()
            ));

            match (param, file) {
                (_, Some((file, file_name, path))) => {
                    text.push_str(&format!("; filename=\"{}\"\r\n", file_name));
                    text.push_str(&format!("Content-Type: {}\r\n\r\n", file.content_type()));
                    parts.push(Part::Text(Bytes::from(std::mem::take(&mut text))));
                    parts.push(Part::File(path.to_path_buf()));
                }
                (FormParameter::Field(field), None) => {
                    text.push_str("\r\n\r\n");
                    text.push_str(&field.value);
                }
                (FormParameter::File(_), None) => {}
            }
        }

        text.push_str("\r\n--");
        text.push_str(BOUNDARY);
        text.push_str("--");
        parts.push(Part::Text(Bytes::from(text)));
        MultipartBody { parts }
    }
}

impl From<FormRequest> for Request {
    fn from(form: FormRequest) -> Self {
        form.to_request()
    }
}

#[derive(Debug, Clone)]
enum Part {
    Text(Bytes),
    File(PathBuf),
}

/// Multipart body whose files are read as the stream reaches them
#[derive(Debug)]
struct MultipartBody {
    parts: Vec<Part>,
}

#[async_trait]
impl BodySource for MultipartBody {
    async fn open(&self) -> io::Result<BodyStream> {
        let parts = self.parts.clone();
        let stream = stream::iter(parts)
            .then(|part| async move {
                match part {
                    Part::Text(text) => Ok(bytes_stream(text)),
                    Part::File(path) => file_stream(&path).await,
                }
            })
            .try_flatten();
        Ok(stream.boxed())
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request body sources
//!
//! A body is a recipe for producing bytes, not the bytes themselves: every
//! call to [`Body::open`] yields a fresh stream, so one request can be
//! executed any number of times.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::io::ReaderStream;

use super::CHUNK_SIZE;

/// Stream of body chunks
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Custom body producer
#[async_trait]
pub trait BodySource: Send + Sync + fmt::Debug {
    /// Open a fresh stream over the body
    async fn open(&self) -> io::Result<BodyStream>;
}

/// Request body
#[derive(Clone)]
pub enum Body {
    /// In-memory bytes
    Bytes(Bytes),
    /// Contents of a file, read lazily
    File(PathBuf),
    /// Any other producer
    Source(Arc<dyn BodySource>),
}

impl Body {
    /// Open a fresh stream over the body
    pub async fn open(&self) -> io::Result<BodyStream> {
        match self {
            Body::Bytes(bytes) => Ok(bytes_stream(bytes.clone())),
            Body::File(path) => file_stream(path).await,
            Body::Source(source) => source.open().await,
        }
    }

    /// Size in bytes when it is known without opening the body
    pub fn known_len(&self) -> Option<u64> {
        match self {
            Body::Bytes(bytes) => Some(bytes.len() as u64),
            _ => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::File(path) => f.debug_tuple("File").field(path).finish(),
            Body::Source(source) => f.debug_tuple("Source").field(source).finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

/// Single-chunk stream over in-memory bytes
pub(crate) fn bytes_stream(bytes: Bytes) -> BodyStream {
    stream::once(async move { Ok(bytes) }).boxed()
}

/// Lazily read a file in chunks
pub(crate) async fn file_stream(path: &std::path::Path) -> io::Result<BodyStream> {
    let file = tokio::fs::File::open(path).await?;
    Ok(ReaderStream::with_capacity(file, CHUNK_SIZE).boxed())
}

/// Drain a body stream into memory
pub async fn collect(mut stream: BodyStream) -> io::Result<Bytes> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_bytes_body_reopens() {
        let body = Body::from("hello");
        assert_eq!(collect(body.open().await.unwrap()).await.unwrap(), "hello");
        assert_eq!(collect(body.open().await.unwrap()).await.unwrap(), "hello");
        assert_eq!(body.known_len(), Some(5));
    }

    #[tokio::test]
    async fn test_file_body() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = vec![b'x'; CHUNK_SIZE * 2 + 10];
        file.write_all(&content).unwrap();

        let body = Body::File(file.path().to_path_buf());
        let collected = collect(body.open().await.unwrap()).await.unwrap();
        assert_eq!(collected.len(), content.len());
        assert_eq!(body.known_len(), None);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let body = Body::File(PathBuf::from("/definitely/not/here.bin"));
        assert!(body.open().await.is_err());
    }
}

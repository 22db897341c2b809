// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Turning a finished response into the value a service hands out

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::http::Response;

/// Converts a response into a service's output
///
/// Runs on the worker once the response is complete. An error moves the
/// service to FAILED.
pub trait ResponseDecoder: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn decode(&self, response: &Response) -> Result<Self::Output>;
}

/// Keeps only the response itself
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl ResponseDecoder for Passthrough {
    type Output = ();

    fn decode(&self, _response: &Response) -> Result<()> {
        Ok(())
    }
}

/// Decodes the body as text using the response charset
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl ResponseDecoder for TextDecoder {
    type Output = String;

    fn decode(&self, response: &Response) -> Result<String> {
        Ok(response.text())
    }
}

/// Deserializes a JSON body
pub struct JsonDecoder<T>(PhantomData<fn() -> T>);

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonDecoder")
    }
}

impl<T> ResponseDecoder for JsonDecoder<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Output = T;

    fn decode(&self, response: &Response) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            Error::decode(format!(
                "status {} body is not valid JSON: {}",
                response.status_code(),
                e
            ))
        })
    }
}

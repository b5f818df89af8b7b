//! Device parameter API.
//!
//! The two calls every view is built on. Implementations decide the
//! transport; the client only sees parameter objects and [`ApiError`].

use async_trait::async_trait;
use coopdash_core::ParameterSet;
use thiserror::Error;

/// Errors that can occur when talking to the device.
///
/// Every variant is treated as transient: callers log it and rely on the
/// next poll tick or user action to recover.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Connection, DNS or timeout failure.
    #[error("Request failed: {0}")]
    Transport(String),

    /// Non-2xx response.
    #[error("Device responded with status {0}")]
    Status(u16),

    /// Read response was not JSON.
    #[error("Unexpected content type {0:?}")]
    UnexpectedContentType(String),

    /// Read response body could not be decoded as a JSON object.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Read response lacked a field the caller needs.
    #[error("Response is missing field {0}")]
    MissingField(&'static str),

    /// The selector query could not be built.
    #[error("Failed to encode query: {0}")]
    Encode(String),
}

/// Read and write access to the device's parameters.
#[async_trait]
pub trait ParamsApi: Send + Sync {
    /// `GET /api/get_params?<query>`: read the selected parameters.
    async fn get_params(&self, query: &str) -> Result<ParameterSet, ApiError>;

    /// `POST /api/set_params`: write a full or partial parameter object.
    async fn set_params(&self, params: &ParameterSet) -> Result<(), ApiError>;
}

//! HTTP transport for the device API, built on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use coopdash_core::log::LogPage;
use coopdash_core::ParameterSet;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::api::{ApiError, ParamsApi};

/// Device API over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpParamsApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpParamsApi {
    /// Create a client for the device at `base_url` (e.g. `http://192.168.1.1`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, None)
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// Without a timeout a hung request stalls its caller indefinitely.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /api/get_log`: a page of the device log, newest first.
    pub async fn get_log(&self, pos: usize, nmr: usize) -> Result<LogPage, ApiError> {
        let url = format!("{}?pos={}&nmr={}", self.url("/api/get_log"), pos, nmr);
        let response = self.client.get(url).send().await.map_err(transport)?;
        let response = check_status(response)?;
        response
            .json::<LogPage>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ParamsApi for HttpParamsApi {
    async fn get_params(&self, query: &str) -> Result<ParameterSet, ApiError> {
        let url = format!("{}?{}", self.url("/api/get_params"), query);
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(transport)?;
        let response = check_status(response)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/json") {
            return Err(ApiError::UnexpectedContentType(content_type));
        }

        match response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?
        {
            Value::Object(params) => Ok(params),
            other => Err(ApiError::Decode(format!("expected a JSON object, got {other}"))),
        }
    }

    async fn set_params(&self, params: &ParameterSet) -> Result<(), ApiError> {
        let url = self.url("/api/set_params");
        debug!("POST {} ({} keys)", url, params.len());

        let response = self
            .client
            .post(url)
            .json(params)
            .send()
            .await
            .map_err(transport)?;
        check_status(response)?;
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status(status.as_u16()))
    }
}

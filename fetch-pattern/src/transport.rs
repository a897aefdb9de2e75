//! The network collaborator the machine delegates to.
//!
//! The machine only needs something shaped like [`Transport`]: take a
//! request, eventually produce a status and a body, or fail.
//! [`HttpTransport`] is the reqwest-backed implementation used outside of
//! tests.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigError, TransportConfig};

/// The arguments of a single fetch, forwarded to the transport verbatim.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    /// Absolute URL, or a path joined onto the transport's base URL.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Overrides the transport's default timeout for this request.
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(
        mut self,
        name: &str,
        value: &str,
    ) -> Result<Self, TransportError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as JSON and set the matching content type.
    pub fn json(
        mut self,
        body: &impl Serialize,
    ) -> Result<Self, TransportError> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What the transport hands back when the call itself completed, whatever
/// the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    /// A failure described only by its message.
    #[error("{0}")]
    Failed(String),
}

/// Executes a [`FetchRequest`].
///
/// The returned future must be `Send` so the machine can drive it from a
/// spawned tokio task.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send
    {
        (**self).execute(request)
    }
}

/// A [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Build a client with the configured user agent and default timeout.
    pub fn from_config(config: &TransportConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Absolute URLs pass through untouched; anything else is joined onto
    /// the base URL.
    fn resolve_url(&self, url: &str) -> Result<String, TransportError> {
        if reqwest::Url::parse(url).is_ok() {
            return Ok(url.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            )),
            None => Err(TransportError::InvalidUrl(url.to_string())),
        }
    }

    fn prepare(
        &self,
        request: &FetchRequest,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = self.resolve_url(&request.url)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder)
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send
    {
        let prepared = self.prepare(request);
        async move {
            let response = prepared?.send().await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok(TransportResponse { status, body })
        }
    }
}

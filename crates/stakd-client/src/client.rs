//! The single request function every endpoint wrapper goes through.

use std::sync::Arc;
use std::time::Instant;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use stakd_core::api::is_envelope;
use stakd_core::{ApiError, ApiResponse, Error, Result, ToQuery};

use crate::auth::TokenProvider;
use crate::config::ClientConfig;

/// One REST call: method, path relative to the base URL, query and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request with no query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends one query pair.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends every pair produced by `params`.
    pub fn query(mut self, params: &impl ToQuery) -> Self {
        self.query.extend(params.query_pairs());
        self
    }

    /// Sets a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query pairs in insertion order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

/// Shared REST transport.
///
/// Cheap to clone. Sends exactly one attempt per call and never retries.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds a client from configuration and a token source.
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_http(http, &config.api_url, tokens))
    }

    /// Builds a client around an existing `reqwest::Client`.
    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                tokens,
            }),
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Absolute URL for a relative path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Sends `req` and normalizes the outcome into an [`ApiResponse`].
    pub async fn request<T: DeserializeOwned>(&self, req: ApiRequest) -> ApiResponse<T> {
        let url = self.url(&req.path);
        let mut builder = self.inner.http.request(req.method.clone(), &url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(token) = self.inner.tokens.token().await {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %req.method, path = %req.path, error = %e, "request failed");
                return ApiResponse::Failure(ApiError::network(e.to_string()));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(method = %req.method, path = %req.path, error = %e, "response body read failed");
                return ApiResponse::Failure(ApiError::network(e.to_string()));
            }
        };

        tracing::debug!(
            method = %req.method,
            path = %req.path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request complete"
        );

        decode_response(status, &body)
    }

    /// [`request`](Self::request) converted into a `Result`.
    pub async fn send<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T> {
        self.request(req).await.into_result().map_err(Error::Api)
    }
}

/// Maps a status and raw body onto the normalized result.
pub(crate) fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> ApiResponse<T> {
    let code = status.as_u16();
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Some(Value::Null)
    } else {
        serde_json::from_slice::<Value>(body).ok()
    };

    if !status.is_success() {
        let error = value
            .filter(is_envelope)
            .and_then(|v| serde_json::from_value::<ApiResponse<Value>>(v).ok())
            .and_then(|envelope| envelope.err().cloned())
            .unwrap_or_else(|| ApiError::http_status(code, status.canonical_reason()));
        return ApiResponse::Failure(error.with_status(code));
    }

    let Some(value) = value else {
        return ApiResponse::Failure(
            ApiError::decode("response body is not valid JSON").with_status(code),
        );
    };

    if is_envelope(&value) {
        return match serde_json::from_value::<ApiResponse<T>>(value) {
            Ok(ApiResponse::Failure(err)) => ApiResponse::Failure(err.with_status(code)),
            Ok(success) => success,
            Err(e) => ApiResponse::Failure(ApiError::decode(e.to_string()).with_status(code)),
        };
    }

    match serde_json::from_value::<T>(value) {
        Ok(data) => ApiResponse::Success(data),
        Err(e) => ApiResponse::Failure(ApiError::decode(e.to_string()).with_status(code)),
    }
}

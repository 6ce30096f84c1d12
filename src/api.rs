//! Store backend API client.
//!
//! Thin reqwest wrapper over the backend's REST endpoints: catalog reads,
//! order submission and product reviews. Responses come back as JSON
//! values; the catalog, order and review modules interpret them.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::CatalogSource;
use crate::config::KioskConfig;
use crate::error::{KioskError, KioskResult};
use crate::order::{OrderGateway, OrderRequest};
use crate::reviews::{ReviewGateway, ReviewRequest, ReviewDeletion};

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - ensure a scheme is present (http for localhost, https otherwise)
/// - strip trailing slashes
pub fn normalize_api_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> KioskError {
    let message = if err.is_connect() {
        format!("Cannot reach store backend at {url}")
    } else if err.is_timeout() {
        format!("Connection to {url} timed out")
    } else if err.is_builder() {
        format!("Invalid store backend URL: {url}")
    } else {
        format!("Network error communicating with {url}: {err}")
    };
    KioskError::Network(message)
}

/// Fallback message for an HTTP status without a usable error body.
fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "Request rejected by store backend".to_string(),
        403 => "Not authorized".to_string(),
        404 => "Store backend endpoint not found".to_string(),
        s if s >= 500 => "Store backend server error".to_string(),
        _ => "Unexpected response from store backend".to_string(),
    }
}

/// Build the error for a non-2xx response, preferring the backend's own
/// `{"error": "..."}` message.
fn status_error(status: StatusCode, body_text: &str) -> KioskError {
    let message = serde_json::from_str::<Value>(body_text)
        .ok()
        .and_then(|json| {
            json.get("error")
                .or_else(|| json.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| status_message(status));
    KioskError::Http {
        status: status.as_u16(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> KioskResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KioskError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: normalize_api_url(base_url),
            http,
        })
    }

    pub fn from_config(config: &KioskConfig) -> KioskResult<Self> {
        Self::new(&config.api_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request against the backend.
    ///
    /// `path` includes the leading slash, e.g. `/getproducts`. Returns the
    /// JSON body, or `Value::Null` for an empty body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
    ) -> KioskResult<Value> {
        let full_url = format!("{}{path}", self.base_url);
        debug!(method = %method, path, "store backend request");

        let mut req = self
            .http
            .request(method, &full_url)
            .header("Content-Type", "application/json");
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            let err = status_error(status, &body_text);
            warn!(path, status = status.as_u16(), error = %err, "store backend request failed");
            return Err(err);
        }

        // a 2xx whose body cannot be read is not an acknowledgement
        let body_text = resp
            .text()
            .await
            .map_err(|e| KioskError::Network(format!("Failed to read response from {path}: {e}")))?;
        if body_text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text)
            .map_err(|e| KioskError::InvalidResponse(format!("{path}: {e}")))
    }

    async fn post_json<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
        idempotency_key: Option<&str>,
    ) -> KioskResult<Value> {
        let value = serde_json::to_value(body)
            .map_err(|e| KioskError::InvalidResponse(format!("serialize {path}: {e}")))?;
        self.request(Method::POST, path, Some(&value), idempotency_key)
            .await
    }
}

#[async_trait]
impl CatalogSource for ApiClient {
    async fn fetch_products(&self) -> KioskResult<Value> {
        self.request(Method::GET, "/getproducts", None, None).await
    }

    async fn fetch_ingredients(&self) -> KioskResult<Value> {
        self.request(Method::GET, "/getingredients", None, None).await
    }
}

#[async_trait]
impl OrderGateway for ApiClient {
    async fn submit_order(&self, request: &OrderRequest, idempotency_key: &str) -> KioskResult<Value> {
        self.post_json("/submitorder", request, Some(idempotency_key))
            .await
    }
}

#[async_trait]
impl ReviewGateway for ApiClient {
    async fn add_review(&self, request: &ReviewRequest) -> KioskResult<Value> {
        self.post_json("/addreview", request, None).await
    }

    async fn delete_review(&self, request: &ReviewDeletion) -> KioskResult<Value> {
        self.post_json("/deletereview", request, None).await
    }
}

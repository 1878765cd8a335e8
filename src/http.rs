//! JSON-over-HTTP transport for the gateway endpoints
//!
//! Every call is a single attempt bounded by the configured timeout. The
//! transport never fails: network errors, timeouts and unreadable bodies come
//! back as an `AjaxResponse` with `ok == false` and a tagged `result`.

use crate::config::HttpConfig;
use crate::models::{AjaxResponse, TransportFailure};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// One-shot JSON POST returning a uniform envelope
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, body: &Value) -> AjaxResponse;
}

pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0"),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .default_headers(headers)
            .build()?;

        Ok(Self { inner: client })
    }

    /// Underlying client, shared with callers that need plain requests
    pub fn client(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn post(&self, url: &str, body: &Value) -> AjaxResponse {
        let sent = self
            .inner
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .json(body)
            .send()
            .await;

        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => return failure_envelope(url, &e),
        };

        let status = resp.status();
        match resp.text().await {
            Ok(text) => envelope(status, text),
            Err(e) => failure_envelope(url, &e),
        }
    }
}

fn envelope(status: StatusCode, raw_text: String) -> AjaxResponse {
    let ok = status == StatusCode::OK || status == StatusCode::NOT_MODIFIED;
    if !ok {
        tracing::debug!("Gateway answered {}", status);
    }

    let (result, failure) = parse_body(&raw_text);
    AjaxResponse {
        ok,
        http_status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        result,
        raw_text,
        failure,
    }
}

fn failure_envelope(url: &str, err: &reqwest::Error) -> AjaxResponse {
    let failure = if err.is_timeout() {
        TransportFailure::Timeout
    } else {
        TransportFailure::NetworkError
    };
    tracing::warn!("Request to {} failed ({}): {}", url, failure, err);

    AjaxResponse {
        ok: false,
        http_status: err.status().map(|s| s.as_u16()).unwrap_or(0),
        status_text: match failure {
            TransportFailure::Timeout => "Timeout".to_string(),
            _ => String::new(),
        },
        result: json!({ "error": failure.tag() }),
        raw_text: String::new(),
        failure: Some(failure),
    }
}

/// Parse a response body, folding anything that is not a JSON object into a
/// `parse_error` sentinel
fn parse_body(raw: &str) -> (Value, Option<TransportFailure>) {
    if raw.trim().is_empty() {
        return (json!({}), None);
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => (value, None),
        _ => (
            json!({
                "error": TransportFailure::ParseError.tag(),
                "message": "Non-JSON response",
                "rawText": raw,
            }),
            Some(TransportFailure::ParseError),
        ),
    }
}

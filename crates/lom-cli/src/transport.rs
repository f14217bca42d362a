//! How the workflow talks to the API.

use std::fmt;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Anything that went wrong between sending a request and holding a decoded
/// JSON body. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The request could not be sent or no response arrived.
    Request { url: String, message: String },
    /// The server answered with a non-2xx status.
    Status { url: String, status: u16, body: String },
    /// The response body is not JSON.
    Decode { url: String, message: String },
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Request { url, message } => {
                write!(f, "request to {url} failed: {message}")
            }
            TransportFailure::Status { url, status, body } => {
                write!(f, "request to {url} returned status {status}: {body}")
            }
            TransportFailure::Decode { url, message } => {
                write!(f, "response from {url} is not JSON: {message}")
            }
        }
    }
}

impl std::error::Error for TransportFailure {}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// JSON request/response exchange with the API.
///
/// `path` is relative to the API root, with or without a leading `/`.
#[async_trait::async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, TransportFailure>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportFailure>;
}

/// `<root>/<path>` with exactly one `/` between them.
pub fn join_url(api_root: &str, path: &str) -> String {
    format!(
        "{}/{}",
        api_root.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    api_root: String,
}

impl HttpTransport {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_root: api_root.into(),
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    async fn send(
        &self,
        url: String,
        req: reqwest::RequestBuilder,
    ) -> Result<Value, TransportFailure> {
        let resp = req
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TransportFailure::Request {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| TransportFailure::Request {
            url: url.clone(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(TransportFailure::Status {
                url,
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| TransportFailure::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ApiTransport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Value, TransportFailure> {
        let url = join_url(&self.api_root, path);
        let req = self.http.get(&url);
        self.send(url, req).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportFailure> {
        let url = join_url(&self.api_root, path);
        let req = self.http.post(&url).body(body.to_string());
        self.send(url, req).await
    }
}

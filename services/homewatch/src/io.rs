//! HTTP client abstraction for testability

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Chunks of a streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = crate::Result<Vec<u8>>> + Send>>;

/// A response whose body is consumed incrementally
pub struct StreamResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .finish()
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Open a `text/event-stream` GET request
    async fn get_event_stream(&self, url: &str) -> crate::Result<StreamResponse>;

    /// Send a PUT request with a JSON body
    async fn put_json(&self, url: &str, body: &serde_json::Value) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get_event_stream(&self, url: &str) -> crate::Result<StreamResponse> {
        tracing::debug!("GET (stream) {}", redact(url));
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| {
                crate::HomewatchError::Http(format!(
                    "GET {} failed: {}",
                    redact(url),
                    e.without_url()
                ))
            })?;

        let status = response.status().as_u16();
        tracing::debug!("GET (stream) {} -> {}", redact(url), status);

        let body = response.bytes_stream().map(|chunk| {
            chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                crate::HomewatchError::Http(format!("Reading event stream: {}", e.without_url()))
            })
        });

        Ok(StreamResponse {
            status,
            body: Box::pin(body),
        })
    }

    async fn put_json(&self, url: &str, body: &serde_json::Value) -> crate::Result<HttpResponse> {
        tracing::debug!("PUT {}", redact(url));
        let response = self
            .client
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                crate::HomewatchError::Http(format!(
                    "PUT {} failed: {}",
                    redact(url),
                    e.without_url()
                ))
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| crate::HomewatchError::Http(format!("Reading response body: {}", e)))?;

        tracing::debug!("PUT {} -> {} ({} bytes)", redact(url), status, body.len());
        Ok(HttpResponse { status, body })
    }
}

/// Strip the query string so auth tokens never reach the logs
pub fn redact(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

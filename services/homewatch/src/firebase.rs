//! Firebase Realtime Database channel over the REST streaming API
//!
//! Subscriptions are `GET <db><path>.json` requests with
//! `Accept: text/event-stream`. The server sends a `put` with the current
//! value at path `/` right away and again on every change. Writes are
//! `PUT <db><path>.json?print=silent`.
//!
//! Dropped streams are reopened with exponential backoff; each failure is
//! delivered to the subscriber as a [`ChannelEvent::Error`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use crate::channel::{ChannelEvent, RemoteChannel, Subscription, SubscriptionSender};
use crate::config::{ChannelConfig, ReconnectConfig};
use crate::error::{HomewatchError, Result};
use crate::io::HttpClient;
use crate::sse::{SseDecoder, SseEvent};

/// Payload of `put` and `patch` events
#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// What a single server-sent event means for a leaf subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Value(Value),
    Ignore,
    /// The server closed the stream for good (e.g. security rules changed)
    Cancelled(String),
    AuthRevoked,
}

/// Interpret one event received on a subscription to a leaf path
pub fn interpret(event: &SseEvent) -> Result<StreamUpdate> {
    match event.event.as_str() {
        "put" => {
            let payload: PathData = serde_json::from_str(&event.data)?;
            if payload.path == "/" {
                Ok(StreamUpdate::Value(payload.data))
            } else {
                tracing::debug!("Ignoring child update at {}", payload.path);
                Ok(StreamUpdate::Ignore)
            }
        }
        "patch" => {
            // Leaf values are replaced with put; a patch only merges children.
            let payload: PathData = serde_json::from_str(&event.data)?;
            tracing::debug!("Ignoring patch at {}", payload.path);
            Ok(StreamUpdate::Ignore)
        }
        "keep-alive" => Ok(StreamUpdate::Ignore),
        "cancel" => Ok(StreamUpdate::Cancelled(event.data.clone())),
        "auth_revoked" => Ok(StreamUpdate::AuthRevoked),
        other => {
            tracing::debug!("Ignoring unknown event type '{}'", other);
            Ok(StreamUpdate::Ignore)
        }
    }
}

/// How one streaming connection ended
#[derive(Debug)]
enum StreamEnd {
    Released,
    Closed,
    Cancelled(String),
}

/// Channel backed by a Firebase Realtime Database
pub struct FirebaseChannel {
    database_url: String,
    auth_token: Option<String>,
    reconnect: ReconnectConfig,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for FirebaseChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseChannel")
            .field("database_url", &self.database_url)
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}

impl FirebaseChannel {
    pub fn new(
        database_url: &str,
        auth_token: Option<String>,
        reconnect: ReconnectConfig,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let database_url = database_url.trim_end_matches('/').to_string();
        tracing::debug!("Created FirebaseChannel for {}", database_url);
        Self {
            database_url,
            auth_token,
            reconnect,
            http,
        }
    }

    pub fn from_config(config: &ChannelConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        match config {
            ChannelConfig::Firebase {
                database_url,
                auth_token,
                reconnect,
                ..
            } => Ok(Self::new(
                database_url,
                auth_token.clone(),
                reconnect.clone(),
                http,
            )),
            other => Err(HomewatchError::Config(format!(
                "Expected a firebase channel, got {}",
                other.type_name()
            ))),
        }
    }

    /// REST URL for `path`, with the auth token and extra query parameters
    pub fn url_for(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}{}.json", self.database_url, path);
        let auth = self.auth_token.as_deref().map(|token| ("auth", token));
        for (i, (key, value)) in auth.into_iter().chain(params.iter().copied()).enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }
}

#[async_trait]
impl RemoteChannel for FirebaseChannel {
    fn description(&self) -> String {
        format!("firebase: {}", self.database_url)
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let (tx, subscription) = Subscription::pair(path);
        let url = self.url_for(path, &[]);
        let http = Arc::clone(&self.http);
        let reconnect = self.reconnect.clone();
        let path = path.to_string();

        tokio::spawn(async move {
            stream_loop(http, url, path, reconnect, tx).await;
        });

        Ok(subscription)
    }

    async fn write(&self, path: &str, value: Value) -> Result<()> {
        let url = self.url_for(path, &[("print", "silent")]);
        let response = self
            .http
            .put_json(&url, &value)
            .await
            .map_err(|e| HomewatchError::Write {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        if response.status != 200 && response.status != 204 {
            return Err(HomewatchError::Write {
                path: path.to_string(),
                message: format!("status {}: {}", response.status, response.body.trim()),
            });
        }
        tracing::debug!("Wrote {} = {}", path, value);
        Ok(())
    }
}

async fn stream_loop(
    http: Arc<dyn HttpClient>,
    url: String,
    path: String,
    reconnect: ReconnectConfig,
    tx: SubscriptionSender,
) {
    let mut attempt: u32 = 0;

    loop {
        let outcome = tokio::select! {
            _ = tx.released() => break,
            outcome = run_stream(http.as_ref(), &url, &path, &tx, &mut attempt) => outcome,
        };

        let message = match outcome {
            Ok(StreamEnd::Released) => break,
            Ok(StreamEnd::Cancelled(reason)) => {
                tracing::warn!("Stream for {} cancelled by server: {}", path, reason);
                tx.send(ChannelEvent::Error(format!("cancelled: {}", reason)))
                    .await;
                break;
            }
            Ok(StreamEnd::Closed) => "stream closed by server".to_string(),
            Err(e) => e.to_string(),
        };

        let delay = reconnect.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        tracing::warn!(
            "Stream for {} failed: {} (reconnecting in {:?})",
            path, message, delay
        );
        if !tx.send(ChannelEvent::Error(message)).await {
            break;
        }

        tokio::select! {
            _ = tx.released() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("Stream for {} released", path);
}

async fn run_stream(
    http: &dyn HttpClient,
    url: &str,
    path: &str,
    tx: &SubscriptionSender,
    attempt: &mut u32,
) -> Result<StreamEnd> {
    let response = http.get_event_stream(url).await?;
    if response.status != 200 {
        return Err(HomewatchError::Subscription {
            path: path.to_string(),
            message: format!("status {}", response.status),
        });
    }

    tracing::info!("Streaming {}", path);
    *attempt = 0;

    let mut body = response.body;
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = body.next().await {
        for event in decoder.push(&chunk?) {
            match interpret(&event) {
                Ok(StreamUpdate::Value(value)) => {
                    if !tx.send(ChannelEvent::Value(value)).await {
                        return Ok(StreamEnd::Released);
                    }
                }
                Ok(StreamUpdate::Ignore) => {}
                Ok(StreamUpdate::Cancelled(reason)) => return Ok(StreamEnd::Cancelled(reason)),
                Ok(StreamUpdate::AuthRevoked) => {
                    return Err(HomewatchError::Subscription {
                        path: path.to_string(),
                        message: "auth token revoked".to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Malformed {} event on {}: {}", event.event, path, e);
                    if !tx
                        .send(ChannelEvent::Error(format!("malformed event: {}", e)))
                        .await
                    {
                        return Ok(StreamEnd::Released);
                    }
                }
            }
        }
    }

    Ok(StreamEnd::Closed)
}

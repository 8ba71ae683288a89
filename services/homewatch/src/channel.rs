//! Remote data channel seam: path-addressed subscribe and write

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Buffer between a channel's producer task and the subscription holder
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// An event delivered on a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The value at the subscribed path (initial value or a change)
    Value(Value),
    /// The channel could not establish or maintain the subscription
    Error(String),
}

/// Receiving half of a path subscription.
///
/// Dropping it releases the subscription: the producer observes the release
/// token and stops.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    events: mpsc::Receiver<ChannelEvent>,
    release: CancellationToken,
}

/// Producing half of a path subscription, held by the channel implementation
#[derive(Debug, Clone)]
pub struct SubscriptionSender {
    events: mpsc::Sender<ChannelEvent>,
    release: CancellationToken,
}

impl Subscription {
    /// Create a connected sender/subscription pair for `path`
    pub fn pair(path: &str) -> (SubscriptionSender, Subscription) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let release = CancellationToken::new();
        (
            SubscriptionSender {
                events: tx,
                release: release.clone(),
            },
            Subscription {
                path: path.to_string(),
                events: rx,
                release,
            },
        )
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next event; `None` once the producer has finished
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release.cancel();
    }
}

impl SubscriptionSender {
    /// Deliver an event; returns false once the subscription was released
    pub async fn send(&self, event: ChannelEvent) -> bool {
        if self.release.is_cancelled() {
            return false;
        }
        self.events.send(event).await.is_ok()
    }

    pub fn is_released(&self) -> bool {
        self.release.is_cancelled()
    }

    /// Resolves when the subscription holder drops its end
    pub async fn released(&self) {
        self.release.cancelled().await
    }
}

/// A path-addressed key/value store with push subscriptions
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait RemoteChannel: Send + Sync {
    /// Human-readable description used in logs and the dashboard
    fn description(&self) -> String;

    /// Open a subscription; the current value is delivered first, then every change
    async fn subscribe(&self, path: &str) -> crate::Result<Subscription>;

    /// Write a value at `path` (no transaction, last write wins)
    async fn write(&self, path: &str, value: Value) -> crate::Result<()>;
}

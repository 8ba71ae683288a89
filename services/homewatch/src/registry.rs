//! Stream registry: one live subscription per watched field
//!
//! Each subscription is drained by its own forwarding task, which turns
//! channel events into typed [`StreamEvent`]s on a single queue. Per-field
//! order is therefore the channel's delivery order; nothing is promised
//! across fields.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelEvent, RemoteChannel, Subscription};
use crate::field::SensorField;
use crate::reading::{current_epoch_ms, decode_value, Reading};

/// Capacity of the queue feeding the aggregation loop
pub const EVENT_QUEUE_SIZE: usize = 256;

/// What the registry forwards to the aggregation loop
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Reading(Reading),
    Failure {
        field: SensorField,
        message: String,
        at_epoch_ms: u64,
    },
}

pub struct StreamRegistry {
    channel: Arc<dyn RemoteChannel>,
    sink: mpsc::Sender<StreamEvent>,
    tasks: BTreeMap<SensorField, JoinHandle<()>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("channel", &self.channel.description())
            .field("subscribed", &self.subscribed())
            .finish()
    }
}

impl StreamRegistry {
    pub fn new(channel: Arc<dyn RemoteChannel>, sink: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            channel,
            sink,
            tasks: BTreeMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe every field not already subscribed.
    ///
    /// A subscription that cannot be opened is reported as a failure event
    /// and left closed; the field stays at its last value. Returns the number
    /// of subscriptions opened.
    pub async fn start(&mut self, fields: &[SensorField]) -> usize {
        let mut opened = 0;

        for &field in fields {
            if self.tasks.contains_key(&field) {
                tracing::debug!("Field {} already subscribed", field);
                continue;
            }

            match self.channel.subscribe(field.path()).await {
                Ok(subscription) => {
                    tracing::debug!("Subscribed {} at {}", field, field.path());
                    let handle = tokio::spawn(forward(
                        field,
                        subscription,
                        self.sink.clone(),
                        self.cancel.clone(),
                    ));
                    self.tasks.insert(field, handle);
                    opened += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to subscribe {}: {}", field, e);
                    let _ = self
                        .sink
                        .send(StreamEvent::Failure {
                            field,
                            message: e.to_string(),
                            at_epoch_ms: current_epoch_ms(),
                        })
                        .await;
                }
            }
        }

        tracing::info!(
            "Stream registry watching {} field(s) on {}",
            self.tasks.len(),
            self.channel.description()
        );
        opened
    }

    pub fn is_subscribed(&self, field: SensorField) -> bool {
        self.tasks.contains_key(&field)
    }

    pub fn subscribed(&self) -> Vec<SensorField> {
        self.tasks.keys().copied().collect()
    }

    /// Release every subscription and wait for the forwarding tasks to finish
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        for (field, handle) in std::mem::take(&mut self.tasks) {
            if let Err(e) = handle.await {
                tracing::warn!("Forwarding task for {} ended abnormally: {}", field, e);
            }
        }
        self.cancel = CancellationToken::new();
        tracing::debug!("Stream registry stopped");
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn forward(
    field: SensorField,
    mut subscription: Subscription,
    sink: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = subscription.next() => event,
        };

        let now_ms = current_epoch_ms();
        let outgoing = match event {
            Some(ChannelEvent::Value(raw)) => {
                let value = decode_value(field, &raw).unwrap_or_else(|e| {
                    tracing::warn!("{}; treating as missing", e);
                    None
                });
                tracing::debug!("{} <- {:?}", field, value);
                StreamEvent::Reading(Reading::new(field, value, now_ms))
            }
            Some(ChannelEvent::Error(message)) => {
                tracing::warn!("Channel error for {}: {}", field, message);
                StreamEvent::Failure {
                    field,
                    message,
                    at_epoch_ms: now_ms,
                }
            }
            None => {
                tracing::debug!("Subscription for {} ended", field);
                break;
            }
        };

        if sink.send(outgoing).await.is_err() {
            tracing::debug!("Event queue closed, stopping {}", field);
            break;
        }
    }
}

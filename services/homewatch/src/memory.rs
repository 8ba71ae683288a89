//! In-process remote channel
//!
//! Behaves like the remote store: a subscription first receives the current
//! value (when one exists), then every change; writes are echoed back to all
//! subscribers of the path. Used by tests and for running the dashboard
//! without a database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use crate::channel::{ChannelEvent, RemoteChannel, Subscription};
use crate::error::HomewatchError;

const CHANGE_BUFFER: usize = 256;

#[derive(Debug)]
pub struct MemoryChannel {
    values: RwLock<BTreeMap<String, Value>>,
    changes: broadcast::Sender<(String, ChannelEvent)>,
    writes: RwLock<Vec<(String, Value)>>,
    subscribe_failures: RwLock<BTreeMap<String, String>>,
    write_failures: RwLock<BTreeMap<String, String>>,
    active: Arc<AtomicUsize>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::with_seed(BTreeMap::new())
    }

    pub fn with_seed(seed: BTreeMap<String, Value>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            values: RwLock::new(seed),
            changes,
            writes: RwLock::new(Vec::new()),
            subscribe_failures: RwLock::new(BTreeMap::new()),
            write_failures: RwLock::new(BTreeMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change a value as another client (e.g. the sensor firmware) would
    pub async fn set(&self, path: &str, value: Value) {
        // Store and broadcast under one guard so echo order matches store order
        let mut values = self.values.write().await;
        values.insert(path.to_string(), value.clone());
        let _ = self
            .changes
            .send((path.to_string(), ChannelEvent::Value(value)));
    }

    /// Deliver a transport error to every subscriber of `path`
    pub fn inject_error(&self, path: &str, message: &str) {
        let _ = self.changes.send((
            path.to_string(),
            ChannelEvent::Error(message.to_string()),
        ));
    }

    /// Make future subscriptions to `path` fail
    pub async fn fail_subscriptions(&self, path: &str, message: &str) {
        self.subscribe_failures
            .write()
            .await
            .insert(path.to_string(), message.to_string());
    }

    /// Make future writes to `path` fail
    pub async fn fail_writes(&self, path: &str, message: &str) {
        self.write_failures
            .write()
            .await
            .insert(path.to_string(), message.to_string());
    }

    pub async fn value(&self, path: &str) -> Option<Value> {
        self.values.read().await.get(path).cloned()
    }

    /// Every successful write, in order
    pub async fn writes(&self) -> Vec<(String, Value)> {
        self.writes.read().await.clone()
    }

    /// Number of subscriptions whose producer is still running
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteChannel for MemoryChannel {
    fn description(&self) -> String {
        "memory".to_string()
    }

    async fn subscribe(&self, path: &str) -> crate::Result<Subscription> {
        if let Some(message) = self.subscribe_failures.read().await.get(path) {
            return Err(HomewatchError::Subscription {
                path: path.to_string(),
                message: message.clone(),
            });
        }

        let (current, mut changes) = {
            let values = self.values.read().await;
            (values.get(path).cloned(), self.changes.subscribe())
        };
        let (tx, subscription) = Subscription::pair(path);
        let path = path.to_string();
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let mut open = match current {
                Some(value) => tx.send(ChannelEvent::Value(value)).await,
                None => true,
            };
            while open {
                tokio::select! {
                    _ = tx.released() => break,
                    change = changes.recv() => match change {
                        Ok((changed_path, event)) if changed_path == path => {
                            open = tx.send(event).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!("Subscription {} missed {} changes", path, missed);
                            open = tx
                                .send(ChannelEvent::Error(format!("missed {} changes", missed)))
                                .await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("Memory subscription {} released", path);
            active.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(subscription)
    }

    async fn write(&self, path: &str, value: Value) -> crate::Result<()> {
        if let Some(message) = self.write_failures.read().await.get(path) {
            return Err(HomewatchError::Write {
                path: path.to_string(),
                message: message.clone(),
            });
        }
        self.writes
            .write()
            .await
            .push((path.to_string(), value.clone()));
        self.set(path, value).await;
        Ok(())
    }
}

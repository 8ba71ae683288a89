//! Actuator command gateway
//!
//! Turns user intents into remote writes. Commands never touch the snapshot:
//! the new LED state shows up only once the write is echoed back through the
//! `ledState` subscription.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::aggregator::StateHandle;
use crate::channel::RemoteChannel;
use crate::error::HomewatchError;
use crate::field::SensorField;

/// A write that has been issued but not necessarily acknowledged.
///
/// Dropping it leaves the write running (fire-and-forget).
#[derive(Debug)]
pub struct PendingWrite {
    pub path: &'static str,
    pub value: Value,
    handle: JoinHandle<crate::Result<()>>,
}

impl PendingWrite {
    /// Wait for the channel to accept the write
    pub async fn acknowledged(self) -> crate::Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(HomewatchError::Write {
                path: self.path.to_string(),
                message: format!("write task failed: {}", e),
            }),
        }
    }
}

#[derive(Clone)]
pub struct ActuatorGateway {
    channel: Arc<dyn RemoteChannel>,
    state: StateHandle,
}

impl std::fmt::Debug for ActuatorGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorGateway")
            .field("channel", &self.channel.description())
            .finish()
    }
}

impl ActuatorGateway {
    pub fn new(channel: Arc<dyn RemoteChannel>, state: StateHandle) -> Self {
        Self { channel, state }
    }

    /// Write the negation of the last known LED state; unknown counts as off
    pub async fn toggle_led(&self) -> crate::Result<PendingWrite> {
        let current = {
            let state = self.state.read().await;
            state
                .snapshot()
                .reading(SensorField::LedState)
                .and_then(|r| r.boolean())
        };
        let next = !current.unwrap_or(false);
        tracing::info!("Toggling LED: {:?} -> {}", current, next);
        Ok(self.issue(SensorField::LedState, json!(next)))
    }

    /// Write a brightness in percent; out-of-range input issues no write
    pub fn set_brightness(&self, percent: i64) -> crate::Result<PendingWrite> {
        if !(0..=100).contains(&percent) {
            tracing::warn!("Rejected brightness {}", percent);
            return Err(HomewatchError::InvalidBrightness(percent));
        }
        tracing::info!("Setting LED brightness to {}%", percent);
        Ok(self.issue(SensorField::LedBrightness, json!(percent)))
    }

    fn issue(&self, field: SensorField, value: Value) -> PendingWrite {
        let path = field.path();
        let channel = Arc::clone(&self.channel);
        let body = value.clone();

        let handle = tokio::spawn(async move {
            match channel.write(path, body).await {
                Ok(()) => {
                    tracing::debug!("Write to {} acknowledged", path);
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("Write failure: {}", e);
                    Err(e)
                }
            }
        });

        PendingWrite {
            path,
            value,
            handle,
        }
    }
}

//! Engine: the single aggregation loop that owns all state mutation

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::aggregator::StateHandle;
use crate::registry::StreamEvent;

/// Consumes stream events and applies them to the shared aggregator
pub struct Engine {
    events: mpsc::Receiver<StreamEvent>,
    state: StateHandle,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        events: mpsc::Receiver<StreamEvent>,
        state: StateHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            events,
            state,
            cancel,
        }
    }

    /// Apply events until the cancellation token fires or every sender is
    /// gone. Returns the number of events applied.
    pub async fn run(mut self) -> u64 {
        let mut applied = 0u64;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Aggregation loop cancelled");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        apply_event(&self.state, event).await;
                        applied += 1;
                    }
                    None => {
                        tracing::debug!("Event queue closed");
                        break;
                    }
                },
            }
        }

        tracing::debug!("Aggregation loop applied {} event(s)", applied);
        applied
    }
}

/// Apply one event to completion under the write lock
pub async fn apply_event(state: &StateHandle, event: StreamEvent) {
    let mut state = state.write().await;
    match event {
        StreamEvent::Reading(reading) => {
            let field = reading.field;
            let snapshot = state.apply(reading);
            tracing::debug!(
                "Applied {} ({} field(s) known, last updated {:?})",
                field,
                snapshot.len(),
                snapshot.last_updated_epoch_ms
            );
        }
        StreamEvent::Failure {
            field,
            message,
            at_epoch_ms,
        } => {
            tracing::debug!("Recording fault for {}: {}", field, message);
            state.record_failure(field, message, at_epoch_ms);
        }
    }
}

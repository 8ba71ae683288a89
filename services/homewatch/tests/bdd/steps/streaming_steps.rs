//! BDD step definitions for live streaming through the registry and engine

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use homewatch::aggregator::{new_state_handle, StateHandle};
use homewatch::classifier::Classifier;
use homewatch::config::HistoryConfig;
use homewatch::engine::Engine;
use homewatch::gateway::ActuatorGateway;
use homewatch::memory::MemoryChannel;
use homewatch::reading::ReadingValue;
use homewatch::registry::{StreamRegistry, EVENT_QUEUE_SIZE};
use homewatch::view::DashboardView;
use homewatch::SensorField;

use super::classification_steps::parse_status;
use crate::world::HomewatchWorld;

const WAIT_STEPS: usize = 200;
const WAIT_INTERVAL: Duration = Duration::from_millis(5);

fn state(world: &HomewatchWorld) -> StateHandle {
    world.state.as_ref().expect("session not started").clone()
}

fn channel(world: &HomewatchWorld) -> Arc<MemoryChannel> {
    world.channel.as_ref().expect("channel not set").clone()
}

fn parse_fields(list: &str) -> Vec<SensorField> {
    list.split(',')
        .map(|s| s.trim().parse().expect("unknown field"))
        .collect()
}

/// Wait until the aggregator has recorded `count` readings in total
async fn wait_for_recorded(state: &StateHandle, count: u64) {
    for _ in 0..WAIT_STEPS {
        if state.read().await.history().total_recorded() >= count {
            return;
        }
        tokio::time::sleep(WAIT_INTERVAL).await;
    }
    panic!("timed out waiting for {} recorded readings", count);
}

#[given(expr = "a memory channel session watching {string}")]
async fn session_watching(world: &mut HomewatchWorld, fields: String) {
    let channel = Arc::new(MemoryChannel::new());
    let state = new_state_handle(HistoryConfig::Unbounded);
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);

    let engine = Engine::new(rx, state.clone(), cancel.clone());
    world.engine = Some(tokio::spawn(engine.run()));

    let mut registry = StreamRegistry::new(channel.clone(), tx);
    registry.start(&parse_fields(&fields)).await;

    world.gateway = Some(ActuatorGateway::new(channel.clone(), state.clone()));
    world.channel = Some(channel);
    world.state = Some(state);
    world.registry = Some(registry);
    world.cancel = Some(cancel);
}

#[when(expr = "the remote value at {string} becomes {float}")]
async fn remote_value_becomes(world: &mut HomewatchWorld, path: String, value: f64) {
    let state = state(world);
    let before = state.read().await.history().total_recorded();
    channel(world).set(&path, json!(value)).await;
    wait_for_recorded(&state, before + 1).await;
}

#[when(expr = "the remote value at {string} becomes the text {string}")]
async fn remote_value_becomes_text(world: &mut HomewatchWorld, path: String, value: String) {
    let state = state(world);
    let before = state.read().await.history().total_recorded();
    channel(world).set(&path, json!(value)).await;
    wait_for_recorded(&state, before + 1).await;
}

#[when(expr = "the channel reports {string} on {string}")]
async fn channel_reports_error(world: &mut HomewatchWorld, message: String, path: String) {
    let field = SensorField::from_path(&path).expect("unknown path");
    channel(world).inject_error(&path, &message);

    let state = state(world);
    for _ in 0..WAIT_STEPS {
        if state.read().await.fault(field).is_some() {
            return;
        }
        tokio::time::sleep(WAIT_INTERVAL).await;
    }
    panic!("timed out waiting for a fault on {}", field);
}

#[when("the session is stopped")]
async fn session_stopped(world: &mut HomewatchWorld) {
    if let Some(mut registry) = world.registry.take() {
        registry.stop().await;
    }
    if let Some(cancel) = world.cancel.take() {
        cancel.cancel();
    }
    if let Some(engine) = world.engine.take() {
        engine.await.expect("engine task failed");
    }
}

#[then(expr = "the status of {word} should be {string}")]
async fn status_of_field(world: &mut HomewatchWorld, field: String, expected: String) {
    let field: SensorField = field.parse().expect("unknown field");
    let state = state(world);
    let state = state.read().await;
    let view = DashboardView::build(&state, &Classifier::default(), &[field]);
    let status = view.field(field).and_then(|f| f.status);
    assert_eq!(status, parse_status(&expected));
}

#[then(expr = "the value of {word} should be {float}")]
async fn value_of_field(world: &mut HomewatchWorld, field: String, expected: f64) {
    let field: SensorField = field.parse().expect("unknown field");
    let value = state(world).read().await.snapshot().value(field);
    assert_eq!(value, Some(ReadingValue::Number(expected)));
}

#[then(expr = "the value of {word} should be missing")]
async fn value_of_field_missing(world: &mut HomewatchWorld, field: String) {
    let field: SensorField = field.parse().expect("unknown field");
    let value = state(world).read().await.snapshot().value(field);
    assert_eq!(value, None);
}

#[then(expr = "the history of {word} should be {string}")]
async fn history_of_field(world: &mut HomewatchWorld, field: String, expected: String) {
    let field: SensorField = field.parse().expect("unknown field");
    let state = state(world);
    let state = state.read().await;
    let values: Vec<String> = state
        .history()
        .for_field(field)
        .map(|e| match e.value {
            Some(v) => v.to_string(),
            None => "null".to_string(),
        })
        .collect();
    assert_eq!(values.join(","), expected);
}

#[then(expr = "the session fault on {word} should be {string}")]
async fn session_fault(world: &mut HomewatchWorld, field: String, expected: String) {
    let field: SensorField = field.parse().expect("unknown field");
    let state = state(world);
    let state = state.read().await;
    let fault = state
        .fault(field)
        .unwrap_or_else(|| panic!("no fault recorded for {}", field));
    assert_eq!(fault.message, expected);
}

#[then(expr = "{int} subscription(s) should be open")]
async fn open_subscriptions(world: &mut HomewatchWorld, expected: usize) {
    let channel = channel(world);
    for _ in 0..WAIT_STEPS {
        if channel.active_subscriptions() == expected {
            return;
        }
        tokio::time::sleep(WAIT_INTERVAL).await;
    }
    assert_eq!(channel.active_subscriptions(), expected);
}

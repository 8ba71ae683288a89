//! BDD step definitions for dashboard feature

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use cucumber::{given, then, when};
use tower::ServiceExt;

use homewatch::aggregator::new_state_handle;
use homewatch::classifier::Classifier;
use homewatch::config::HistoryConfig;
use homewatch::dashboard::{build_router, DashboardState};
use homewatch::gateway::ActuatorGateway;
use homewatch::memory::MemoryChannel;
use homewatch::reading::{Reading, ReadingValue};
use homewatch::SensorField;

use crate::world::HomewatchWorld;

fn dashboard_state(world: &HomewatchWorld) -> DashboardState {
    let state = world.state.as_ref().expect("state not set").clone();
    let gateway = world.gateway.as_ref().expect("gateway not set").clone();
    DashboardState {
        state,
        classifier: Arc::new(Classifier::default()),
        gateway,
        fields: Arc::new(SensorField::ALL.to_vec()),
        refresh_interval_ms: 2000,
    }
}

async fn send(world: &mut HomewatchWorld, request: Request<Body>) {
    let app = build_router(dashboard_state(world));
    let response = app.oneshot(request).await.unwrap();
    world.response_status = Some(response.status().as_u16());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    world.response_body = Some(String::from_utf8(body.to_vec()).unwrap());
}

#[given("a dashboard over a memory channel")]
fn dashboard_over_memory(world: &mut HomewatchWorld) {
    let channel = Arc::new(MemoryChannel::new());
    let state = new_state_handle(HistoryConfig::default());
    world.gateway = Some(ActuatorGateway::new(channel.clone(), state.clone()));
    world.channel = Some(channel);
    world.state = Some(state);
}

#[given(expr = "the dashboard has {word} at {float} observed at {int}")]
async fn dashboard_has_reading(world: &mut HomewatchWorld, field: String, value: f64, at: u64) {
    let field: SensorField = field.parse().expect("unknown field");
    let state = world.state.as_ref().expect("state not set");
    state.write().await.apply(Reading::new(
        field,
        Some(ReadingValue::Number(value)),
        at,
    ));
}

#[when(expr = "the dashboard page {string} is requested")]
async fn page_requested(world: &mut HomewatchWorld, uri: String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(world, request).await;
}

#[when(expr = "a brightness of {int} is posted to the dashboard")]
async fn brightness_posted(world: &mut HomewatchWorld, percent: i64) {
    let body = serde_json::json!({ "percent": percent }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/led/brightness")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    send(world, request).await;
}

#[when(expr = "{string} is posted to the dashboard")]
async fn posted(world: &mut HomewatchWorld, uri: String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(world, request).await;
}

#[then(expr = "the response status should be {int}")]
fn response_status(world: &mut HomewatchWorld, expected: u16) {
    assert_eq!(world.response_status, Some(expected));
}

#[then(expr = "the response should contain {string}")]
fn response_contains(world: &mut HomewatchWorld, expected: String) {
    let body = world.response_body.as_ref().expect("no response body");
    assert!(
        body.contains(&expected),
        "Expected response to contain '{}', but it didn't.\nResponse body:\n{}",
        expected,
        body
    );
}

#[then(expr = "the response JSON at {string} should be {string}")]
fn response_json_at(world: &mut HomewatchWorld, pointer: String, expected: String) {
    let body = world.response_body.as_ref().expect("no response body");
    let json: serde_json::Value = serde_json::from_str(body).expect("response is not JSON");
    let actual = json
        .pointer(&pointer)
        .unwrap_or_else(|| panic!("nothing at {} in {}", pointer, body));
    let actual = match actual {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    assert_eq!(actual, expected);
}

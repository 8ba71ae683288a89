//! BDD step definitions for homewatch builder and lifecycle feature

use std::collections::BTreeMap;
use std::time::Duration;

use cucumber::{given, then, when};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use homewatch::config::{ChannelConfig, Config, DashboardConfig, ReconnectConfig};
use homewatch::HomewatchBuilder;

use crate::world::HomewatchWorld;

fn headless(channel: ChannelConfig) -> Config {
    Config {
        channel,
        dashboard: DashboardConfig {
            enabled: false,
            ..DashboardConfig::default()
        },
        ..Config::default()
    }
}

fn builder(world: &mut HomewatchWorld) -> HomewatchBuilder {
    let config = world.config.clone().expect("config not set");
    let mut builder = HomewatchBuilder::new(config);
    if let Some(cancel) = world.lifecycle_cancel.take() {
        builder = builder.with_cancellation_token(cancel);
    }
    builder
}

#[given("a headless config with a memory channel")]
fn headless_memory_config(world: &mut HomewatchWorld) {
    world.config = Some(headless(ChannelConfig::default()));
}

#[given(expr = "a headless config with a memory channel seeded with temperature {int}")]
fn headless_seeded_config(world: &mut HomewatchWorld, temperature: i64) {
    let seed = BTreeMap::from([("/temperature".to_string(), json!(temperature))]);
    world.config = Some(headless(ChannelConfig::Memory { seed }));
}

#[given(expr = "a headless config with a firebase channel at {string}")]
fn headless_firebase_config(world: &mut HomewatchWorld, database_url: String) {
    world.config = Some(headless(ChannelConfig::Firebase {
        database_url,
        auth_token: None,
        auth_token_env: None,
        reconnect: ReconnectConfig::default(),
    }));
}

#[given("a pre-cancelled cancellation token")]
fn pre_cancelled_token(world: &mut HomewatchWorld) {
    let token = CancellationToken::new();
    token.cancel();
    world.lifecycle_cancel = Some(token);
}

#[when("the homewatch is built")]
async fn homewatch_is_built(world: &mut HomewatchWorld) {
    let builder = builder(world);
    world.build_succeeded = Some(builder.build().await.is_ok());
}

#[when("the homewatch is built and started")]
async fn homewatch_is_built_and_started(world: &mut HomewatchWorld) {
    let builder = builder(world);
    match builder.build().await {
        Ok(homewatch) => {
            world.build_succeeded = Some(true);
            let result = tokio::time::timeout(Duration::from_secs(5), homewatch.start()).await;
            world.start_succeeded = Some(matches!(result, Ok(Ok(()))));
        }
        Err(_) => {
            world.build_succeeded = Some(false);
            world.start_succeeded = Some(false);
        }
    }
}

#[when("the homewatch runs until the seeded temperature is applied")]
async fn homewatch_runs_until_seeded(world: &mut HomewatchWorld) {
    let cancel = CancellationToken::new();
    let homewatch = builder(world)
        .with_cancellation_token(cancel.clone())
        .build()
        .await
        .expect("build failed");
    world.build_succeeded = Some(true);
    let state = homewatch.state();
    let session = tokio::spawn(homewatch.start());

    for _ in 0..200 {
        if state.read().await.history().total_recorded() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    cancel.cancel();
    world.start_succeeded = Some(matches!(session.await, Ok(Ok(()))));
    world.state = Some(state);
}

#[then("the build should succeed")]
fn build_should_succeed(world: &mut HomewatchWorld) {
    assert_eq!(
        world.build_succeeded,
        Some(true),
        "Expected build to succeed"
    );
}

#[then("the build should fail")]
fn build_should_fail(world: &mut HomewatchWorld) {
    assert_eq!(world.build_succeeded, Some(false), "Expected build to fail");
}

#[then("the lifecycle should complete successfully")]
fn lifecycle_should_complete(world: &mut HomewatchWorld) {
    assert_eq!(
        world.build_succeeded,
        Some(true),
        "Expected build to succeed"
    );
    assert_eq!(
        world.start_succeeded,
        Some(true),
        "Expected start to succeed"
    );
}

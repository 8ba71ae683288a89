//! Homewatch - Home environment monitoring dashboard
//!
//! Subscribes to sensor values in a remote realtime store, classifies them
//! against threshold profiles, and serves a live dashboard with LED controls.

pub mod aggregator;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod field;
pub mod firebase;
pub mod gateway;
pub mod io;
pub mod memory;
pub mod reading;
pub mod registry;
pub mod sse;
pub mod view;

pub use config::{load_config, Config};
pub use error::{HomewatchError, Result};
pub use field::SensorField;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::aggregator::StateHandle;
use crate::channel::RemoteChannel;
use crate::classifier::Classifier;
use crate::config::{ChannelConfig, HistoryConfig};
use crate::dashboard::DashboardState;
use crate::engine::Engine;
use crate::firebase::FirebaseChannel;
use crate::gateway::ActuatorGateway;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::memory::MemoryChannel;
use crate::registry::{StreamRegistry, EVENT_QUEUE_SIZE};

/// Assembles a [`Homewatch`] from configuration, with optional injected parts
pub struct HomewatchBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    channel: Option<Arc<dyn RemoteChannel>>,
    cancel: Option<CancellationToken>,
}

impl HomewatchBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            channel: None,
            cancel: None,
        }
    }

    /// HTTP client used by the Firebase channel
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Use this channel instead of the one described by the config
    pub fn with_channel(mut self, channel: Arc<dyn RemoteChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn build(self) -> Result<Homewatch> {
        validate(&self.config)?;

        let channel: Arc<dyn RemoteChannel> = match self.channel {
            Some(channel) => channel,
            None => match &self.config.channel {
                ChannelConfig::Memory { seed } => Arc::new(MemoryChannel::with_seed(seed.clone())),
                firebase @ ChannelConfig::Firebase { .. } => {
                    let http: Arc<dyn HttpClient> = match self.http {
                        Some(http) => http,
                        None => Arc::new(ReqwestHttpClient::new()),
                    };
                    Arc::new(FirebaseChannel::from_config(firebase, http)?)
                }
            },
        };
        tracing::debug!("Using channel {}", channel.description());

        let state = aggregator::new_state_handle(self.config.history.clone());
        let classifier = Arc::new(Classifier::new(
            &self.config.classifier,
            &self.config.alerts,
        ));
        let gateway = ActuatorGateway::new(Arc::clone(&channel), Arc::clone(&state));

        Ok(Homewatch {
            config: self.config,
            channel,
            state,
            classifier,
            gateway,
            cancel: self.cancel.unwrap_or_else(CancellationToken::new),
        })
    }
}

fn validate(config: &Config) -> Result<()> {
    if let ChannelConfig::Firebase { database_url, .. } = &config.channel {
        if database_url.trim().is_empty() {
            return Err(HomewatchError::Config(
                "firebase channel requires a database_url".to_string(),
            ));
        }
    }

    for (field, profile) in &config.classifier.thresholds {
        if profile.safe_upper_bound > profile.warning_upper_bound {
            return Err(HomewatchError::Config(format!(
                "threshold profile for {} has safe bound {} above warning bound {}",
                field, profile.safe_upper_bound, profile.warning_upper_bound
            )));
        }
    }

    match config.history {
        HistoryConfig::Ring { capacity: 0 } => {
            return Err(HomewatchError::Config(
                "ring history requires a capacity of at least 1".to_string(),
            ));
        }
        HistoryConfig::Window { seconds: 0 } => {
            return Err(HomewatchError::Config(
                "window history requires at least 1 second".to_string(),
            ));
        }
        _ => {}
    }

    if config.fields.watch.is_empty() {
        tracing::warn!("No fields configured to watch");
    }
    Ok(())
}

/// A configured session, ready to start
pub struct Homewatch {
    config: Config,
    channel: Arc<dyn RemoteChannel>,
    state: StateHandle,
    classifier: Arc<Classifier>,
    gateway: ActuatorGateway,
    cancel: CancellationToken,
}

impl Homewatch {
    pub fn state(&self) -> StateHandle {
        Arc::clone(&self.state)
    }

    pub fn gateway(&self) -> ActuatorGateway {
        self.gateway.clone()
    }

    pub fn channel(&self) -> Arc<dyn RemoteChannel> {
        Arc::clone(&self.channel)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// State shared with the dashboard router
    pub fn dashboard_state(&self) -> DashboardState {
        DashboardState {
            state: self.state(),
            classifier: Arc::clone(&self.classifier),
            gateway: self.gateway(),
            fields: Arc::new(self.config.fields.watch.clone()),
            refresh_interval_ms: self.config.dashboard.refresh_interval_ms,
        }
    }

    /// Run the session until the cancellation token fires or Ctrl-C is received
    pub async fn start(self) -> Result<()> {
        let cancel = self.cancel.clone();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);

        let engine = Engine::new(rx, self.state(), cancel.clone());
        let engine_handle = tokio::spawn(engine.run());

        let mut registry = StreamRegistry::new(self.channel(), tx);
        registry.start(&self.config.fields.watch).await;

        let cancel_for_signal = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    cancel_for_signal.cancel();
                }
                Err(e) => tracing::warn!("Failed to listen for ctrl-c: {}", e),
            }
        });

        let dashboard_handle = if self.config.dashboard.enabled {
            let dashboard_port = self.config.dashboard.port;
            let router = dashboard::build_router(self.dashboard_state());
            let cancel_for_dashboard = cancel.clone();

            Some(tokio::spawn(async move {
                let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::error!(
                            "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                            dashboard_port,
                            e
                        );
                        return;
                    }
                };
                tracing::info!("Dashboard listening on http://{}", addr);

                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        cancel_for_dashboard.cancelled().await;
                    })
                    .await
                    .ok();

                tracing::debug!("Dashboard stopped");
            }))
        } else {
            None
        };

        tracing::info!("Homewatch started on {}", self.channel.description());

        cancel.cancelled().await;

        registry.stop().await;
        match engine_handle.await {
            Ok(applied) => tracing::debug!("Engine stopped after {} event(s)", applied),
            Err(e) => tracing::warn!("Engine task failed: {}", e),
        }
        if let Some(handle) = dashboard_handle {
            let _ = handle.await;
        }

        tracing::info!("Homewatch stopped");
        Ok(())
    }
}

//! Periodic telemetry
//!
//! Runs only while a session is active. It samples read-only data and
//! publishes through the session handle it was created with; it shares no
//! state with the orchestrator.

use crate::platform::MessagingSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tether_core::{TetherError, TimeSource};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Telemetry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub topic: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            topic: "v1/devices/me/telemetry".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// One published sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub sequence: u64,
    pub uptime_ms: u64,
}

/// Publishes samples until the session closes or shutdown is signalled
pub struct TelemetryTask {
    session: Arc<dyn MessagingSession>,
    clock: Arc<dyn TimeSource>,
    config: TelemetryConfig,
    shutdown: watch::Receiver<bool>,
    sequence: u64,
}

impl TelemetryTask {
    pub fn new(
        session: Arc<dyn MessagingSession>,
        clock: Arc<dyn TimeSource>,
        config: TelemetryConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            clock,
            config,
            shutdown,
            sequence: 0,
        }
    }

    /// Build the next sample
    pub fn sample(&mut self) -> TelemetrySample {
        self.sequence += 1;
        TelemetrySample {
            sequence: self.sequence,
            uptime_ms: self.clock.now().as_millis(),
        }
    }

    /// Publish one sample
    pub async fn publish_once(&mut self) -> Result<TelemetrySample, TetherError> {
        let sample = self.sample();
        let payload = serde_json::to_vec(&sample)
            .map_err(|e| TetherError::platform_error(format!("telemetry encoding: {}", e)))?;
        self.session.publish(&self.config.topic, payload).await?;
        debug!("Published telemetry sample {}", sample.sequence);
        Ok(sample)
    }

    pub async fn run(mut self) {
        info!(
            "Telemetry started (topic: {}, every {:?})",
            self.config.topic,
            self.config.interval()
        );
        let mut ticker = tokio::time::interval(self.config.interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.session.is_closed() {
                        info!("Session closed, stopping telemetry");
                        break;
                    }
                    if let Err(e) = self.publish_once().await {
                        warn!("Telemetry publish failed: {}", e);
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Telemetry stopped");
                        break;
                    }
                }
            }
        }
    }
}

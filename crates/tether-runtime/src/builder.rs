//! Orchestrator Builder API
//!
//! Wires the credential store, capability implementations and configuration
//! into a running [`OrchestratorTask`] and hands back an
//! [`OrchestratorHandle`].

use crate::channel::{create_event_channel, send_event, EventSender, DEFAULT_EVENT_CAPACITY};
use crate::logic::{EffectHandlers, OrchestratorStats, OrchestratorTask};
use crate::platform::{
    AccessPointConfig, DnsProbe, MessagingClient, NullIndicator, Portal, Radio,
    ReachabilityProbe, StatusIndicator,
};
use crate::provisioning::ProvisioningIntake;
use crate::session::SessionLauncher;
use crate::telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tether_core::identity::IDENTITY_NAMESPACE;
use tether_core::{
    CertificateManager, ConnectionState, CredentialStore, Event, IdentityStore, ManagerConfig,
    MonotonicTimeSource, Result, StatusReader, StatusRegister, TetherError, TimeSource,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

// ----------------------------------------------------------------------------
// Runtime Configuration
// ----------------------------------------------------------------------------

/// Settings for the runtime itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub event_capacity: usize,
    pub access_point: AccessPointConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            access_point: AccessPointConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Orchestrator Builder
// ----------------------------------------------------------------------------

/// Builder for a running orchestrator
pub struct OrchestratorBuilder {
    storage: Arc<dyn CredentialStore>,
    radio: Option<Arc<dyn Radio>>,
    portal: Option<Arc<dyn Portal>>,
    messaging: Option<Arc<dyn MessagingClient>>,
    probe: Arc<dyn ReachabilityProbe>,
    indicator: Arc<dyn StatusIndicator>,
    clock: Arc<dyn TimeSource>,
    manager_config: ManagerConfig,
    identity_namespace: String,
    config: RuntimeConfig,
}

impl OrchestratorBuilder {
    /// Create a builder over a credential store
    pub fn new(storage: Arc<dyn CredentialStore>) -> Self {
        Self {
            storage,
            radio: None,
            portal: None,
            messaging: None,
            probe: Arc::new(DnsProbe::default()),
            indicator: Arc::new(NullIndicator),
            clock: Arc::new(MonotonicTimeSource::new()),
            manager_config: ManagerConfig::default(),
            identity_namespace: IDENTITY_NAMESPACE.to_string(),
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_radio(mut self, radio: Arc<dyn Radio>) -> Self {
        self.radio = Some(radio);
        self
    }

    pub fn with_portal(mut self, portal: Arc<dyn Portal>) -> Self {
        self.portal = Some(portal);
        self
    }

    pub fn with_messaging(mut self, messaging: Arc<dyn MessagingClient>) -> Self {
        self.messaging = Some(messaging);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_indicator(mut self, indicator: Arc<dyn StatusIndicator>) -> Self {
        self.indicator = indicator;
        self
    }

    /// Replace the clock used for timestamps and certificate expiry
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_manager_config(mut self, config: ManagerConfig) -> Self {
        self.manager_config = config;
        self
    }

    pub fn with_identity_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.identity_namespace = namespace.into();
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_access_point(mut self, access_point: AccessPointConfig) -> Self {
        self.config.access_point = access_point;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build and spawn the orchestrator task
    pub async fn build_and_start(self) -> Result<OrchestratorHandle> {
        let radio = self
            .radio
            .ok_or_else(|| TetherError::config_error("no radio capability registered"))?;
        let portal = self
            .portal
            .ok_or_else(|| TetherError::config_error("no configuration surface registered"))?;
        let messaging = self
            .messaging
            .ok_or_else(|| TetherError::config_error("no messaging client registered"))?;
        tether_core::storage::validate_name(&self.identity_namespace)?;

        let (event_sender, event_receiver) = create_event_channel(self.config.event_capacity);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let (status_writer, status_reader) = StatusRegister::pair();

        radio.attach(event_sender.clone());

        let identities =
            IdentityStore::with_namespace(self.storage.clone(), self.identity_namespace);
        let intake = ProvisioningIntake::new(
            identities.clone(),
            event_sender.clone(),
            status_reader.clone(),
            radio.clone(),
        );
        let launcher = SessionLauncher::new(identities.clone(), messaging);

        let handlers = EffectHandlers::new(
            radio,
            portal,
            self.probe,
            self.indicator,
            launcher,
            identities,
            intake.clone(),
            self.config.access_point,
            self.config.telemetry,
            self.clock.clone(),
            event_sender.clone(),
            shutdown_receiver.clone(),
        );

        let certificates = CertificateManager::new(self.storage, self.clock.clone());
        let task = OrchestratorTask::new(
            certificates,
            self.manager_config,
            status_writer,
            handlers,
            event_receiver,
            shutdown_receiver,
            self.clock,
        );

        let join_handle = tokio::spawn(task.run());
        info!("Orchestrator started");

        Ok(OrchestratorHandle {
            event_sender,
            status: status_reader,
            intake,
            shutdown: shutdown_sender,
            join_handle: Some(join_handle),
        })
    }
}

// ----------------------------------------------------------------------------
// Orchestrator Handle
// ----------------------------------------------------------------------------

/// Handle to a running orchestrator
pub struct OrchestratorHandle {
    event_sender: EventSender,
    status: StatusReader,
    intake: ProvisioningIntake,
    shutdown: watch::Sender<bool>,
    join_handle: Option<JoinHandle<Result<OrchestratorStats>>>,
}

impl OrchestratorHandle {
    /// Inject an event as if a platform collaborator had reported it
    pub async fn send_event(&self, event: Event) -> Result<()> {
        send_event(&self.event_sender, event).await
    }

    /// A sender for platform collaborators started after the build
    pub fn event_sender(&self) -> EventSender {
        self.event_sender.clone()
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionState {
        self.status.get()
    }

    pub fn status_reader(&self) -> StatusReader {
        self.status.clone()
    }

    /// Provisioning intake, for submitting identities without the HTTP surface
    pub fn intake(&self) -> ProvisioningIntake {
        self.intake.clone()
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Ask the orchestrator and telemetry to stop
    pub fn shutdown(&self) {
        info!("Shutting down orchestrator");
        self.shutdown.send_replace(true);
    }

    /// Wait for the orchestrator task to finish
    pub async fn wait(mut self) -> Result<OrchestratorStats> {
        match self.join_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| TetherError::platform_error(format!("orchestrator task failed: {}", e)))?,
            None => Ok(OrchestratorStats::default()),
        }
    }

    /// Signal shutdown, then wait
    pub async fn shutdown_and_wait(self) -> Result<OrchestratorStats> {
        self.shutdown();
        self.wait().await
    }
}

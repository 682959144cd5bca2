//! Effect Handlers
//!
//! Executes the effects produced by a transition against the platform
//! capabilities. Effects whose outcome feeds back into the state machine
//! (probe, session launch) return that outcome as an event for the task to
//! dispatch before anything else in the queue.

use super::state::RuntimeState;
use crate::channel::EventSender;
use crate::platform::{
    AccessPointConfig, MessagingSession, Portal, Radio, ReachabilityProbe, StatusIndicator,
};
use crate::provisioning::ProvisioningIntake;
use crate::session::SessionLauncher;
use crate::telemetry::{TelemetryConfig, TelemetryTask};
use std::sync::Arc;
use tether_core::{
    CertificateManager, Effect, Event, IdentityError, IdentityStore, Result, StatusWriter,
    TimeSource,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capabilities and handles needed to carry out effects
pub struct EffectHandlers {
    pub radio: Arc<dyn Radio>,
    pub portal: Arc<dyn Portal>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub indicator: Arc<dyn StatusIndicator>,
    pub launcher: SessionLauncher,
    pub identities: IdentityStore,
    pub intake: ProvisioningIntake,
    pub access_point: AccessPointConfig,
    pub telemetry: TelemetryConfig,
    pub clock: Arc<dyn TimeSource>,
    /// Handed to the messaging client for lifecycle reports
    pub events: EventSender,
    pub shutdown: watch::Receiver<bool>,
    telemetry_task: Option<JoinHandle<()>>,
}

impl EffectHandlers {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        radio: Arc<dyn Radio>,
        portal: Arc<dyn Portal>,
        probe: Arc<dyn ReachabilityProbe>,
        indicator: Arc<dyn StatusIndicator>,
        launcher: SessionLauncher,
        identities: IdentityStore,
        intake: ProvisioningIntake,
        access_point: AccessPointConfig,
        telemetry: TelemetryConfig,
        clock: Arc<dyn TimeSource>,
        events: EventSender,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            radio,
            portal,
            probe,
            indicator,
            launcher,
            identities,
            intake,
            access_point,
            telemetry,
            clock,
            events,
            shutdown,
            telemetry_task: None,
        }
    }

    /// Execute one effect, returning an outcome event if it produced one
    pub async fn execute(
        &mut self,
        effect: &Effect,
        status: &StatusWriter,
        certificates: &CertificateManager,
        state: &mut RuntimeState,
    ) -> Result<Option<Event>> {
        debug!("Executing effect {:?}", effect);

        match effect {
            Effect::PublishConnectionState(connection) => {
                status.set(*connection);
                Ok(None)
            }
            Effect::SetIndicator(color) => {
                self.indicator.show(*color);
                Ok(None)
            }
            Effect::StartAccessPoint => {
                info!(
                    "Starting access point {:?} (max {} clients)",
                    self.access_point.ssid, self.access_point.max_connections
                );
                self.radio.start_access_point(&self.access_point).await?;
                Ok(None)
            }
            Effect::StartPortal => {
                self.portal.start(self.intake.clone()).await?;
                info!("Configuration surface started");
                Ok(None)
            }
            Effect::StopPortal => {
                self.portal.stop().await?;
                info!("Configuration surface stopped");
                Ok(None)
            }
            Effect::SwitchToStationOnly => {
                self.radio.set_station_only().await?;
                info!("Radio switched to station-only mode");
                Ok(None)
            }
            Effect::ConfigureStation => {
                let ssid = self
                    .identities
                    .stored_ssid()?
                    .ok_or(IdentityError::MissingField { field: "ssid" })?;
                let passphrase = self.identities.passphrase()?;
                self.radio.configure_station(&ssid, &passphrase).await?;
                info!("Station configured for SSID {:?}", ssid);
                Ok(None)
            }
            Effect::StartStation => {
                self.radio.start_station().await?;
                Ok(None)
            }
            Effect::RequestAssociation => {
                state.stats.association_requests += 1;
                debug!("Association request #{}", state.stats.association_requests);
                self.radio.connect().await?;
                Ok(None)
            }
            Effect::ProbeReachability => {
                let reachable = self.probe.probe().await;
                if reachable {
                    info!("Reachability probe succeeded");
                } else {
                    state.stats.probes_failed += 1;
                    warn!("Reachability probe failed, continuing");
                }
                Ok(Some(Event::ProbeCompleted { reachable }))
            }
            Effect::StartSecuredSession => Ok(Some(self.start_session(certificates, state).await)),
        }
    }

    async fn start_session(
        &mut self,
        certificates: &CertificateManager,
        state: &mut RuntimeState,
    ) -> Event {
        match self.launcher.launch(certificates, self.events.clone()).await {
            Ok(session) => {
                state.stats.sessions_started += 1;
                if self.telemetry.enabled {
                    self.spawn_telemetry(session.clone());
                }
                state.session = Some(session);
                Event::SessionStarted
            }
            Err(e) => {
                state.stats.sessions_aborted += 1;
                warn!("Secured session not started: {}", e);
                Event::SessionAborted {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn spawn_telemetry(&mut self, session: Arc<dyn MessagingSession>) {
        if let Some(previous) = self.telemetry_task.take() {
            previous.abort();
        }
        let task = TelemetryTask::new(
            session,
            self.clock.clone(),
            self.telemetry.clone(),
            self.shutdown.clone(),
        );
        self.telemetry_task = Some(tokio::spawn(task.run()));
    }

    /// Stop everything the handlers started
    pub async fn teardown(&mut self, portal_active: bool) {
        if portal_active {
            if let Err(e) = self.portal.stop().await {
                warn!("Failed to stop configuration surface: {}", e);
            }
        }
        if let Some(task) = self.telemetry_task.take() {
            task.abort();
        }
    }
}

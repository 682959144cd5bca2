//! Orchestrator Task Implementation
//!
//! The single consumer of the event queue. Each event is run through the
//! state machine and its effects are executed before the next event is
//! received.

use super::handlers::EffectHandlers;
use super::state::{OrchestratorStats, RuntimeState};
use crate::channel::EventReceiver;
use std::collections::VecDeque;
use std::sync::Arc;
use tether_core::certificate::{DEVELOPMENT_ANCHOR_PEM, MAX_CERT_SIZE};
use tether_core::{
    CertError, CertificateManager, CertificateSource, Event, ManagerConfig, OrchestratorState,
    Result, StatusWriter, TetherError, TimeSource,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

// ----------------------------------------------------------------------------
// Orchestrator Task
// ----------------------------------------------------------------------------

/// Owns the state machine, the certificate manager and the status writer
pub struct OrchestratorTask {
    state: RuntimeState,
    certificates: CertificateManager,
    manager_config: ManagerConfig,
    status: StatusWriter,
    handlers: EffectHandlers,
    event_receiver: EventReceiver,
    shutdown: watch::Receiver<bool>,
    clock: Arc<dyn TimeSource>,
}

impl OrchestratorTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        certificates: CertificateManager,
        manager_config: ManagerConfig,
        status: StatusWriter,
        handlers: EffectHandlers,
        event_receiver: EventReceiver,
        shutdown: watch::Receiver<bool>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            state: RuntimeState::new(),
            certificates,
            manager_config,
            status,
            handlers,
            event_receiver,
            shutdown,
            clock,
        }
    }

    /// Current state machine value
    pub fn machine(&self) -> &OrchestratorState {
        &self.state.machine
    }

    /// Boot, then consume events until shutdown or a fatal channel error
    pub async fn run(mut self) -> Result<OrchestratorStats> {
        info!("Orchestrator starting");

        if let Err(e) = self.boot().await {
            error!("Boot failed: {}", e);
            self.teardown().await;
            return Err(e);
        }

        loop {
            if *self.shutdown.borrow() {
                info!("Shutdown requested");
                break;
            }

            tokio::select! {
                event = self.event_receiver.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.dispatch(event).await {
                                error!("Unrecoverable error, stopping orchestrator: {}", e);
                                self.teardown().await;
                                return Err(e);
                            }
                        }
                        None => {
                            info!("Event queue closed, shutting down");
                            break;
                        }
                    }
                }

                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown handle dropped");
                        break;
                    }
                }
            }
        }

        self.teardown().await;
        Ok(self.state.stats)
    }

    // ------------------------------------------------------------------------
    // Boot
    // ------------------------------------------------------------------------

    async fn boot(&mut self) -> Result<()> {
        match self.certificates.init(self.manager_config.clone()) {
            Ok(()) => self.provision_fallback_anchor(),
            Err(CertError::AlreadyInitialized) => warn!("Certificate manager already initialized"),
            Err(e) => error!("Certificate manager init failed: {}", e),
        }

        let stored_ssid = match self.handlers.identities.stored_ssid() {
            Ok(ssid) => ssid,
            Err(e) => {
                warn!("Failed to read stored identity, treating as absent: {}", e);
                None
            }
        };

        match &stored_ssid {
            Some(ssid) => info!("Stored SSID {:?} found, connecting directly", ssid),
            None => info!("No stored identity, entering provisioning mode"),
        }

        self.dispatch(Event::Boot { stored_ssid }).await
    }

    /// Store the development anchor when nothing usable is stored
    fn provision_fallback_anchor(&self) {
        match self.certificates.load_stored(MAX_CERT_SIZE) {
            Ok(_) if self.certificates.is_certificate_valid() => {
                info!("Stored trust anchor is valid");
            }
            Ok(_) => warn!("Stored trust anchor failed validation"),
            Err(CertError::NotFound) if self.manager_config.allow_development_fallback => {
                info!("No stored trust anchor, provisioning development anchor");
                if let Err(e) = self
                    .certificates
                    .rotate(DEVELOPMENT_ANCHOR_PEM, CertificateSource::Development)
                {
                    error!("Failed to provision development anchor: {}", e);
                }
            }
            Err(CertError::NotFound) => {
                warn!("No trust anchor stored, encrypted sessions cannot start");
            }
            Err(e) => error!("Failed to read stored trust anchor: {}", e),
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Handle one event and every outcome event its effects produce
    async fn dispatch(&mut self, event: Event) -> Result<()> {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            info!("Event {}", event.name());
            debug!("Event detail: {:?}", event);

            let transition = match self.state.apply(event, self.clock.as_ref()) {
                Ok(transition) => transition,
                Err(e) => {
                    warn!("Rejected event: {}", e);
                    continue;
                }
            };

            let audit = &transition.audit_entry;
            if audit.from_phase != audit.to_phase {
                info!("Phase {} -> {}", audit.from_phase, audit.to_phase);
            }

            for effect in &transition.effects {
                self.state.stats.effects_executed += 1;
                match self
                    .handlers
                    .execute(effect, &self.status, &self.certificates, &mut self.state)
                    .await
                {
                    Ok(Some(outcome)) => pending.push_back(outcome),
                    Ok(None) => {}
                    Err(e @ TetherError::Channel { .. }) => return Err(e),
                    Err(e) => {
                        self.state.stats.effect_failures += 1;
                        warn!("Effect {:?} failed: {}", effect, e);
                    }
                }
            }
        }

        Ok(())
    }

    async fn teardown(&mut self) {
        self.handlers
            .teardown(self.state.machine.portal_active)
            .await;
        self.certificates.deinit();
        info!(
            "Orchestrator stopped ({} events, {} effects, {} association requests)",
            self.state.stats.events_processed,
            self.state.stats.effects_executed,
            self.state.stats.association_requests
        );
    }
}

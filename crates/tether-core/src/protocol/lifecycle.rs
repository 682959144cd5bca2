//! Bootstrap Lifecycle State Machine
//!
//! Decides between provisioning and direct reconnection, then follows the
//! station through association, reachability, and secured-session start.
//! Each event is handled exactly once; the resulting effects are executed by
//! the runtime before the next event is dispatched.

use super::events::{Effect, Event, SessionEvent, StatusColor};
use crate::status::ConnectionState;
use crate::types::Timestamp;
use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// State Types
// ----------------------------------------------------------------------------

/// Where the device is in its bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BootPhase {
    /// Power-on, nothing decided yet
    BootDeciding,
    /// Access point and configuration surface up, waiting for an identity
    Provisioning,
    /// Stored identity found, associating without a configuration surface
    DirectConnecting,
    /// Address acquired
    Associated,
    /// Reachability probe finished (either way)
    ConnectivityChecked,
    /// Secured session launch requested
    SessionStarting,
    /// Session handed to the messaging client
    SessionActive,
    /// Association lost; a retry is in flight
    ConnectFailed,
}

impl BootPhase {
    pub fn name(self) -> &'static str {
        match self {
            BootPhase::BootDeciding => "BootDeciding",
            BootPhase::Provisioning => "Provisioning",
            BootPhase::DirectConnecting => "DirectConnecting",
            BootPhase::Associated => "Associated",
            BootPhase::ConnectivityChecked => "ConnectivityChecked",
            BootPhase::SessionStarting => "SessionStarting",
            BootPhase::SessionActive => "SessionActive",
            BootPhase::ConnectFailed => "ConnectFailed",
        }
    }
}

impl fmt::Display for BootPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mode chosen by the boot decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BootMode {
    Provisioning,
    Direct,
}

/// Secured session progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    NotStarted,
    Starting,
    Active,
    /// Launch failed; no automatic retry
    Aborted,
}

/// Complete orchestrator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub phase: BootPhase,
    pub mode: Option<BootMode>,
    pub connection: ConnectionState,
    pub session: SessionStatus,
    pub portal_active: bool,
    /// Association requests issued so far
    pub association_attempts: u64,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// State Transition Results
// ----------------------------------------------------------------------------

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// New orchestrator state
    pub new_state: OrchestratorState,
    /// Effects to execute, in order
    pub effects: Vec<Effect>,
    /// Audit trail entry
    pub audit_entry: AuditEntry,
}

/// Audit trail entry for state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    pub from_phase: BootPhase,
    pub to_phase: BootPhase,
    pub event: String,
    pub effects_count: usize,
}

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    /// Event not meaningful in the current phase
    #[error("Invalid transition from {from_phase} on event {event}: {reason}")]
    InvalidTransition {
        from_phase: BootPhase,
        event: String,
        reason: String,
    },
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl OrchestratorState {
    /// Power-on state
    pub fn new() -> Self {
        Self {
            phase: BootPhase::BootDeciding,
            mode: None,
            connection: ConnectionState::Idle,
            session: SessionStatus::NotStarted,
            portal_active: false,
            association_attempts: 0,
        }
    }

    /// Process an event and produce the next state (consumes self)
    pub fn transition(
        self,
        event: Event,
        at: Timestamp,
    ) -> Result<StateTransition, StateTransitionError> {
        let from_phase = self.phase;
        let event_name = event.name().to_string();

        let (new_state, effects) = match (self.phase, event) {
            (BootPhase::BootDeciding, Event::Boot { stored_ssid }) => self.decide_boot(stored_ssid),

            (_, Event::Boot { .. }) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_phase,
                    event: event_name,
                    reason: "boot decision already made".to_string(),
                });
            }

            (BootPhase::BootDeciding, _) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_phase,
                    event: event_name,
                    reason: "no boot decision yet".to_string(),
                });
            }

            (_, Event::StationStarted) => self.on_station_started(),
            (_, Event::Disassociated { .. }) => self.on_disassociated(),
            (_, Event::AddressAcquired { .. }) => self.on_address_acquired(),
            (_, Event::ConnectRequested) => self.on_connect_requested(),
            (_, Event::ProbeCompleted { reachable }) => self.on_probe_completed(reachable),

            (_, Event::SessionStarted) => {
                let mut state = self;
                state.session = SessionStatus::Active;
                state.phase = BootPhase::SessionActive;
                (state, Vec::new())
            }

            (_, Event::SessionAborted { .. }) => {
                // Connection state is left as the address handler set it
                let mut state = self;
                state.session = SessionStatus::Aborted;
                if state.phase == BootPhase::SessionStarting {
                    state.phase = BootPhase::ConnectivityChecked;
                }
                (state, vec![Effect::SetIndicator(StatusColor::Error)])
            }

            (_, Event::Session(session_event)) => {
                let color = match session_event {
                    SessionEvent::Connected => StatusColor::Connected,
                    SessionEvent::Disconnected => StatusColor::Connecting,
                    SessionEvent::Error { .. } => StatusColor::Error,
                };
                (self, vec![Effect::SetIndicator(color)])
            }
        };

        let audit_entry = AuditEntry {
            timestamp: at,
            from_phase,
            to_phase: new_state.phase,
            event: event_name,
            effects_count: effects.len(),
        };

        Ok(StateTransition {
            new_state,
            effects,
            audit_entry,
        })
    }

    fn decide_boot(mut self, stored_ssid: Option<String>) -> (Self, Vec<Effect>) {
        let has_identity = stored_ssid.map_or(false, |ssid| !ssid.is_empty());

        if has_identity {
            self.phase = BootPhase::DirectConnecting;
            self.mode = Some(BootMode::Direct);
            let effects = vec![
                Effect::SetIndicator(StatusColor::Connecting),
                Effect::ConfigureStation,
                Effect::StartStation,
            ];
            (self, effects)
        } else {
            self.phase = BootPhase::Provisioning;
            self.mode = Some(BootMode::Provisioning);
            self.connection = ConnectionState::Idle;
            self.portal_active = true;
            let effects = vec![
                Effect::StartAccessPoint,
                Effect::StartPortal,
                Effect::PublishConnectionState(ConnectionState::Idle),
                Effect::SetIndicator(StatusColor::Provisioning),
            ];
            (self, effects)
        }
    }

    /// The indicator stays on the provisioning colour while the portal is up
    fn on_station_started(mut self) -> (Self, Vec<Effect>) {
        self.association_attempts += 1;
        let mut effects = Vec::with_capacity(2);
        if !self.portal_active {
            effects.push(Effect::SetIndicator(StatusColor::Connecting));
        }
        effects.push(Effect::RequestAssociation);
        (self, effects)
    }

    /// Retry forever, exactly one association request per disassociation
    fn on_disassociated(mut self) -> (Self, Vec<Effect>) {
        self.connection = ConnectionState::ConnectFailed;
        if self.phase != BootPhase::Provisioning {
            self.phase = BootPhase::ConnectFailed;
        }
        self.association_attempts += 1;
        let effects = vec![
            Effect::PublishConnectionState(ConnectionState::ConnectFailed),
            Effect::SetIndicator(StatusColor::Error),
            Effect::RequestAssociation,
        ];
        (self, effects)
    }

    fn on_address_acquired(mut self) -> (Self, Vec<Effect>) {
        self.connection = ConnectionState::Connected;
        self.phase = BootPhase::Associated;

        let mut effects = vec![
            Effect::PublishConnectionState(ConnectionState::Connected),
            Effect::SetIndicator(StatusColor::Connected),
        ];
        if self.portal_active {
            self.portal_active = false;
            effects.push(Effect::StopPortal);
            effects.push(Effect::SwitchToStationOnly);
        }
        effects.push(Effect::ProbeReachability);
        (self, effects)
    }

    /// A persisted submission; clears an aborted session so it can be retried
    fn on_connect_requested(mut self) -> (Self, Vec<Effect>) {
        self.connection = ConnectionState::Connecting;
        if self.session == SessionStatus::Aborted {
            self.session = SessionStatus::NotStarted;
        }
        self.association_attempts += 1;
        let effects = vec![
            Effect::PublishConnectionState(ConnectionState::Connecting),
            Effect::SetIndicator(StatusColor::Connecting),
            Effect::ConfigureStation,
            Effect::RequestAssociation,
        ];
        (self, effects)
    }

    /// The probe is diagnostic: failure recolours but never blocks the session
    fn on_probe_completed(mut self, reachable: bool) -> (Self, Vec<Effect>) {
        let mut effects = Vec::new();
        if !reachable {
            effects.push(Effect::SetIndicator(StatusColor::Error));
        }

        match self.session {
            SessionStatus::NotStarted => {
                self.phase = BootPhase::SessionStarting;
                self.session = SessionStatus::Starting;
                effects.push(Effect::StartSecuredSession);
            }
            SessionStatus::Active => self.phase = BootPhase::SessionActive,
            SessionStatus::Starting | SessionStatus::Aborted => {
                self.phase = BootPhase::ConnectivityChecked;
            }
        }
        (self, effects)
    }

    /// Whether the configuration surface should be serving
    pub fn is_provisioning(&self) -> bool {
        self.portal_active
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Events consumed and effects produced by the bootstrap state machine

use crate::status::ConnectionState;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// ----------------------------------------------------------------------------
// Event: Platform and Runtime -> State Machine
// ----------------------------------------------------------------------------

/// Everything the orchestrator reacts to, delivered through one ordered queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Power-on decision input: the SSID found in the credential store
    Boot { stored_ssid: Option<String> },
    /// The station role finished starting
    StationStarted,
    /// The station lost (or failed to obtain) its association
    Disassociated { reason: String },
    /// The station obtained an address
    AddressAcquired { ip: IpAddr },
    /// A provisioning submission was persisted
    ConnectRequested,
    /// Outcome of the post-association reachability probe
    ProbeCompleted { reachable: bool },
    /// The secured session launcher produced a session
    SessionStarted,
    /// The secured session launcher gave up; terminal until a new connect request
    SessionAborted { reason: String },
    /// Lifecycle report from a running messaging session
    Session(SessionEvent),
}

impl Event {
    /// Short name for logs and audit entries
    pub fn name(&self) -> &'static str {
        match self {
            Event::Boot { .. } => "Boot",
            Event::StationStarted => "StationStarted",
            Event::Disassociated { .. } => "Disassociated",
            Event::AddressAcquired { .. } => "AddressAcquired",
            Event::ConnectRequested => "ConnectRequested",
            Event::ProbeCompleted { .. } => "ProbeCompleted",
            Event::SessionStarted => "SessionStarted",
            Event::SessionAborted { .. } => "SessionAborted",
            Event::Session(_) => "Session",
        }
    }
}

/// Messaging session lifecycle as reported by the messaging client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Error { message: String },
}

// ----------------------------------------------------------------------------
// Effect: State Machine -> Runtime
// ----------------------------------------------------------------------------

/// Side effects requested by a transition, executed in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Write the connection status register
    PublishConnectionState(ConnectionState),
    /// Drive the status indicator
    SetIndicator(StatusColor),
    /// Bring up the dual-role radio with the provisioning access point
    StartAccessPoint,
    /// Start the configuration surface
    StartPortal,
    /// Stop the configuration surface
    StopPortal,
    /// Drop the access point role
    SwitchToStationOnly,
    /// Load the stored identity into the station role
    ConfigureStation,
    /// Start the station role
    StartStation,
    /// Ask the radio to associate
    RequestAssociation,
    /// Resolve a well-known host; reports `ProbeCompleted`
    ProbeReachability,
    /// Launch the secured messaging session; reports `SessionStarted` or `SessionAborted`
    StartSecuredSession,
}

// ----------------------------------------------------------------------------
// Status Colours
// ----------------------------------------------------------------------------

/// Indicator colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusColor {
    Provisioning,
    Connecting,
    Connected,
    Error,
}

impl StatusColor {
    /// Tri-channel intensity for the actuator
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            StatusColor::Provisioning => (0, 0, 255),
            StatusColor::Connecting => (255, 255, 0),
            StatusColor::Connected => (0, 255, 0),
            StatusColor::Error => (255, 0, 0),
        }
    }
}

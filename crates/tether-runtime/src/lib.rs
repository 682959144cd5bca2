//! Tether Runtime Engine
//!
//! Drives the bootstrap state machine from `tether-core` against real or
//! simulated platform capabilities:
//! - `OrchestratorTask`: the single event consumer owning the state machine,
//!   the certificate manager and the status register writer
//! - `platform`: capability traits for radio, configuration surface,
//!   reachability probe, messaging client and status indicator
//! - `session`: secured-session launch
//! - `provisioning`: the intake handle the configuration surface talks to
//! - `telemetry`: periodic publishing while a session is active
//! - `builder`: wiring everything together

pub mod builder;
pub mod channel;
pub mod logic;
pub mod platform;
pub mod provisioning;
pub mod session;
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{OrchestratorBuilder, OrchestratorHandle, RuntimeConfig};
pub use channel::{create_event_channel, EventReceiver, EventSender};
pub use logic::{OrchestratorStats, OrchestratorTask};
pub use platform::{
    AccessPointConfig, DnsProbe, MessagingClient, MessagingSession, NullIndicator, Portal,
    Radio, ReachabilityProbe, ScanResult, StatusIndicator,
};
pub use provisioning::ProvisioningIntake;
pub use session::{SessionConfig, SessionLauncher};
pub use telemetry::{TelemetryConfig, TelemetrySample, TelemetryTask};

// Re-export core types for convenience
pub use tether_core::{
    BootPhase, CertificateManager, ConnectionState, CredentialStore, Effect, Event,
    IdentityStore, ManagerConfig, OrchestratorState, Result as TetherResult, SessionEvent,
    StatusColor, StatusReader, TetherError,
};

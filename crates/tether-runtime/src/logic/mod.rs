//! Orchestrator Logic
//!
//! - `state`: the state machine value, audit trail and statistics
//! - `handlers`: effect execution against platform capabilities
//! - `task`: the event loop tying them together
//!
//! All orchestrator state is owned by one task. The connection status
//! register and the certificate slots are only written from here, so neither
//! needs a lock; the configuration surface and the telemetry task get
//! read-only handles.

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::EffectHandlers;
pub use state::{OrchestratorStats, RuntimeState, MAX_AUDIT_ENTRIES};
pub use task::OrchestratorTask;

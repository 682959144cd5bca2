//! Bootstrap protocol
//!
//! The orchestrator is a pure state machine: it consumes [`Event`]s and
//! produces a new [`OrchestratorState`] plus the [`Effect`]s a runtime must
//! execute, in order. No I/O happens here.

pub mod events;
pub mod lifecycle;

pub use events::{Effect, Event, SessionEvent, StatusColor};
pub use lifecycle::{
    AuditEntry, BootMode, BootPhase, OrchestratorState, SessionStatus, StateTransition,
    StateTransitionError,
};

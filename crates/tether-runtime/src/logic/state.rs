//! Orchestrator Runtime State
//!
//! The state machine value plus the bookkeeping only the event task sees.

use crate::platform::MessagingSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tether_core::protocol::{AuditEntry, StateTransition};
use tether_core::{Event, OrchestratorState, Result, TimeSource};

/// Audit entries kept before the oldest are dropped
pub const MAX_AUDIT_ENTRIES: usize = 256;

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters returned when the orchestrator stops
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub events_processed: u64,
    pub rejected_events: u64,
    pub effects_executed: u64,
    pub effect_failures: u64,
    pub association_requests: u64,
    pub probes_failed: u64,
    pub sessions_started: u64,
    pub sessions_aborted: u64,
}

// ----------------------------------------------------------------------------
// Runtime State
// ----------------------------------------------------------------------------

/// Everything the event task owns besides its collaborators
pub struct RuntimeState {
    pub machine: OrchestratorState,
    pub audit_trail: Vec<AuditEntry>,
    pub stats: OrchestratorStats,
    /// Handle produced by a successful session launch
    pub session: Option<Arc<dyn MessagingSession>>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self {
            machine: OrchestratorState::new(),
            audit_trail: Vec::new(),
            stats: OrchestratorStats::default(),
            session: None,
        }
    }

    /// Run the pure transition and commit its new state and audit entry
    pub fn apply(&mut self, event: Event, clock: &dyn TimeSource) -> Result<StateTransition> {
        let transition = match self.machine.clone().transition(event, clock.now()) {
            Ok(transition) => transition,
            Err(e) => {
                self.stats.rejected_events += 1;
                return Err(e.into());
            }
        };

        self.stats.events_processed += 1;
        self.machine = transition.new_state.clone();

        if self.audit_trail.len() >= MAX_AUDIT_ENTRIES {
            self.audit_trail.remove(0);
        }
        self.audit_trail.push(transition.audit_entry.clone());

        Ok(transition)
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::testing::MockTimeSource;
    use tether_core::BootPhase;

    #[test]
    fn test_apply_commits_state_and_audit() {
        let clock = MockTimeSource::new();
        let mut state = RuntimeState::new();

        let transition = state
            .apply(Event::Boot { stored_ssid: None }, &clock)
            .unwrap();

        assert_eq!(state.machine.phase, BootPhase::Provisioning);
        assert_eq!(transition.effects.len(), 4);
        assert_eq!(state.audit_trail.len(), 1);
        assert_eq!(state.stats.events_processed, 1);
    }

    #[test]
    fn test_rejected_event_leaves_state() {
        let clock = MockTimeSource::new();
        let mut state = RuntimeState::new();

        assert!(state.apply(Event::StationStarted, &clock).is_err());
        assert_eq!(state.machine, OrchestratorState::new());
        assert_eq!(state.stats.rejected_events, 1);
        assert!(state.audit_trail.is_empty());
    }

    #[test]
    fn test_audit_trail_is_bounded() {
        let clock = MockTimeSource::new();
        let mut state = RuntimeState::new();
        state
            .apply(Event::Boot { stored_ssid: Some("Home".to_string()) }, &clock)
            .unwrap();

        for _ in 0..MAX_AUDIT_ENTRIES + 10 {
            state
                .apply(Event::Disassociated { reason: "beacon timeout".to_string() }, &clock)
                .unwrap();
        }

        assert_eq!(state.audit_trail.len(), MAX_AUDIT_ENTRIES);
        assert_eq!(state.audit_trail[0].event, "Disassociated");
    }
}

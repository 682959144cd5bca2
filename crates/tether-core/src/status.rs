//! Connection Status Register
//!
//! A single shared `ConnectionState`. Exactly one [`StatusWriter`] exists and
//! belongs to the orchestrator; any number of [`StatusReader`]s may be handed
//! to the configuration surface. Reads are plain atomic loads.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Station connectivity as reported to the configuration surface
///
/// The discriminants are part of the external status API (`/api/status`
/// returns the ordinal) and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    ConnectFailed = 3,
}

impl ConnectionState {
    /// Ordinal exposed by the status API
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Decode an ordinal; unknown values are `None`
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(ConnectionState::Idle),
            1 => Some(ConnectionState::Connecting),
            2 => Some(ConnectionState::Connected),
            3 => Some(ConnectionState::ConnectFailed),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::ConnectFailed => "ConnectFailed",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Register
// ----------------------------------------------------------------------------

/// Constructor for the writer/reader pair
pub struct StatusRegister;

impl StatusRegister {
    /// Create a register starting at `Idle`
    pub fn pair() -> (StatusWriter, StatusReader) {
        let cell = Arc::new(AtomicU8::new(ConnectionState::Idle.ordinal()));
        (
            StatusWriter { cell: cell.clone() },
            StatusReader { cell },
        )
    }
}

/// The only handle that can change the register; deliberately not `Clone`
#[derive(Debug)]
pub struct StatusWriter {
    cell: Arc<AtomicU8>,
}

impl StatusWriter {
    /// Publish a new state
    pub fn set(&self, state: ConnectionState) {
        self.cell.store(state.ordinal(), Ordering::Release);
    }

    /// Current state as last written
    pub fn get(&self) -> ConnectionState {
        load(&self.cell)
    }

    /// Create an additional reader
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            cell: self.cell.clone(),
        }
    }
}

/// Read-only view of the register
#[derive(Debug, Clone)]
pub struct StatusReader {
    cell: Arc<AtomicU8>,
}

impl StatusReader {
    /// Current state
    pub fn get(&self) -> ConnectionState {
        load(&self.cell)
    }
}

fn load(cell: &AtomicU8) -> ConnectionState {
    // Only the writer stores, and it only stores valid ordinals
    ConnectionState::from_ordinal(cell.load(Ordering::Acquire)).unwrap_or(ConnectionState::Idle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_are_stable() {
        assert_eq!(ConnectionState::Idle.ordinal(), 0);
        assert_eq!(ConnectionState::Connecting.ordinal(), 1);
        assert_eq!(ConnectionState::Connected.ordinal(), 2);
        assert_eq!(ConnectionState::ConnectFailed.ordinal(), 3);
        assert_eq!(ConnectionState::from_ordinal(4), None);
    }

    #[test]
    fn test_readers_observe_writer() {
        let (writer, reader) = StatusRegister::pair();
        let second_reader = writer.reader();
        assert_eq!(reader.get(), ConnectionState::Idle);

        writer.set(ConnectionState::Connecting);
        assert_eq!(reader.get(), ConnectionState::Connecting);
        assert_eq!(second_reader.get(), ConnectionState::Connecting);

        writer.set(ConnectionState::ConnectFailed);
        assert_eq!(reader.clone().get(), ConnectionState::ConnectFailed);
    }
}

//! Simulated platform capabilities for running on a host

pub mod indicator;
pub mod messaging;
pub mod radio;

pub use indicator::ConsoleIndicator;
pub use messaging::{LoggingMessagingClient, LoggingSession};
pub use radio::SimulatedRadio;

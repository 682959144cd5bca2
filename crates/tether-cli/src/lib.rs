//! Tether CLI library
//!
//! Host-side pieces of the `tether` binary: configuration loading, the HTTP
//! configuration surface, simulated platform capabilities and operator
//! commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod portal;
pub mod sim;

pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use portal::HttpPortal;

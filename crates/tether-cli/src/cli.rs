//! Command-line interface definitions and parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tether_core::CertificateSource;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Data directory for credential storage
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Boot the device against simulated radio and messaging
    Run {
        /// Override the configuration surface listen address
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
    /// Store a network identity without going through the configuration surface
    Provision(ProvisionArgs),
    /// Erase stored credentials and certificates
    Reset {
        /// Keep the certificate slots
        #[arg(long)]
        keep_certificates: bool,
    },
    /// Inspect and manage the trust anchor
    #[command(subcommand)]
    Cert(CertCommand),
    /// Print the default configuration as TOML
    Config,
}

#[derive(Args)]
pub struct ProvisionArgs {
    #[arg(long)]
    pub ssid: String,

    /// Station passphrase; omit for an open network
    #[arg(long, default_value = "")]
    pub password: String,

    /// Messaging endpoint host
    #[arg(long)]
    pub host: String,

    /// Messaging endpoint port; 1883 selects the unencrypted transport
    #[arg(long, default_value = "8883")]
    pub port: String,

    #[arg(long, requires = "pass", conflicts_with = "token")]
    pub user: Option<String>,

    #[arg(long, requires = "user")]
    pub pass: Option<String>,

    /// Device access token
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum CertCommand {
    /// Show metadata and fingerprint of the effective trust anchor
    Show,
    /// Rotate in a PEM certificate, keeping the current one as backup
    Install {
        /// PEM file to install
        file: PathBuf,

        #[arg(long, value_enum, default_value = "config-endpoint")]
        source: SourceArg,
    },
    /// Exit non-zero unless the effective trust anchor validates
    Check,
}

/// Provenance recorded for an installed certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Manufacturing,
    OtaUpdate,
    ConfigEndpoint,
    Development,
}

impl From<SourceArg> for CertificateSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Manufacturing => CertificateSource::Manufacturing,
            SourceArg::OtaUpdate => CertificateSource::OtaUpdate,
            SourceArg::ConfigEndpoint => CertificateSource::ConfigEndpoint,
            SourceArg::Development => CertificateSource::Development,
        }
    }
}

//! Tether CLI Configuration Management
//!
//! Configuration is a single TOML file. Every section and field has a
//! default, so an empty file (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tether_core::identity::{IDENTITY_NAMESPACE, MAX_SSID_LEN};
use tether_core::storage::validate_name;
use tether_core::ManagerConfig;
use tether_runtime::{AccessPointConfig, DnsProbe, RuntimeConfig, TelemetryConfig};

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Environment error: {0}")]
    Environment(String),
}

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the `tether` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub certificates: ManagerConfig,
    pub portal: PortalConfig,
    pub probe: ProbeConfig,
    pub telemetry: TelemetryConfig,
    pub simulation: SimulationConfig,
    pub runtime: RuntimeSection,
}

/// Where credentials live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `~/.tether`
    pub data_dir: Option<PathBuf>,
    pub credentials_namespace: String,
}

/// Configuration surface and provisioning access point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub listen: SocketAddr,
    pub ap_ssid: String,
    /// Empty for an open access point
    pub ap_password: String,
    pub max_connections: u8,
}

/// Post-association reachability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

/// A network the simulated radio can join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedNetwork {
    pub ssid: String,
    #[serde(default)]
    pub passphrase: String,
    #[serde(default = "default_rssi")]
    pub rssi: i8,
}

fn default_rssi() -> i8 {
    -55
}

/// Behaviour of the simulated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub networks: Vec<SimulatedNetwork>,
    pub association_delay_ms: u64,
    /// Delay before a joined network drops the station again; zero never drops
    pub drop_after_secs: u64,
}

/// Event task settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    pub event_capacity: usize,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            credentials_namespace: IDENTITY_NAMESPACE.to_string(),
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        let access_point = AccessPointConfig::default();
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            ap_ssid: access_point.ssid,
            ap_password: access_point.password,
            max_connections: access_point.max_connections,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: "www.google.com".to_string(),
            port: 80,
            timeout_secs: 5,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            networks: vec![SimulatedNetwork {
                ssid: "Home".to_string(),
                passphrase: "password123".to_string(),
                rssi: default_rssi(),
            }],
            association_delay_ms: 500,
            drop_after_secs: 0,
        }
    }
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            event_capacity: RuntimeConfig::default().event_capacity,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Validation
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load and validate a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_name(&self.storage.credentials_namespace)
            .map_err(|e| ConfigError::Validation(format!("storage.credentials_namespace: {}", e)))?;
        validate_name(&self.certificates.namespace)
            .map_err(|e| ConfigError::Validation(format!("certificates.namespace: {}", e)))?;
        if self.storage.credentials_namespace == self.certificates.namespace {
            return Err(ConfigError::Validation(
                "credentials and certificates must use different namespaces".to_string(),
            ));
        }

        if self.portal.ap_ssid.is_empty() || self.portal.ap_ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::Validation(format!(
                "portal.ap_ssid must be 1..={} bytes",
                MAX_SSID_LEN
            )));
        }
        // WPA2 needs at least 8 characters; empty means open
        if !self.portal.ap_password.is_empty() && self.portal.ap_password.len() < 8 {
            return Err(ConfigError::Validation(
                "portal.ap_password must be empty or at least 8 characters".to_string(),
            ));
        }
        if self.portal.max_connections == 0 {
            return Err(ConfigError::Validation(
                "portal.max_connections must be at least 1".to_string(),
            ));
        }

        if self.probe.host.is_empty() || self.probe.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "probe needs a host and a non-zero timeout".to_string(),
            ));
        }
        if self.telemetry.topic.is_empty() {
            return Err(ConfigError::Validation("telemetry.topic is empty".to_string()));
        }
        if self.runtime.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "runtime.event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Data directory, defaulting to `~/.tether`
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".tether"))
                .ok_or_else(|| ConfigError::Environment("No home directory".to_string())),
        }
    }

    pub fn access_point(&self) -> AccessPointConfig {
        AccessPointConfig {
            ssid: self.portal.ap_ssid.clone(),
            password: self.portal.ap_password.clone(),
            max_connections: self.portal.max_connections,
        }
    }

    pub fn probe(&self) -> DnsProbe {
        DnsProbe::new(
            self.probe.host.clone(),
            self.probe.port,
            Duration::from_secs(self.probe.timeout_secs),
        )
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            event_capacity: self.runtime.event_capacity,
            access_point: self.access_point(),
            telemetry: self.telemetry.clone(),
        }
    }

    /// The default configuration rendered as TOML
    pub fn example_config() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.credentials_namespace, "wifi_creds");
        assert_eq!(config.certificates.namespace, "cert_mgr");
        assert_eq!(config.portal.ap_ssid, "ESP32-Provisioning");
        assert_eq!(config.portal.max_connections, 4);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [certificates]
            allow_development_fallback = false

            [portal]
            listen = "0.0.0.0:80"
            ap_password = ""

            [[simulation.networks]]
            ssid = "Office"
            "#,
        )
        .unwrap();

        assert!(!config.certificates.allow_development_fallback);
        assert!(config.certificates.require_integrity_check);
        assert_eq!(config.portal.listen.port(), 80);
        assert!(config.access_point().is_open());
        assert_eq!(config.simulation.networks.len(), 1);
        assert_eq!(config.simulation.networks[0].passphrase, "");
        assert_eq!(config.simulation.networks[0].rssi, -55);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.storage.credentials_namespace = "a_namespace_too_long".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.certificates.namespace = config.storage.credentials_namespace.clone();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.portal.ap_password = "short".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.runtime.event_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        assert!(matches!(
            AppConfig::from_toml("[portal\nlisten = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_example_config_round_trips() {
        let example = AppConfig::example_config().unwrap();
        assert!(example.contains("[certificates]"));
        assert!(example.contains("[portal]"));
        assert_eq!(AppConfig::from_toml(&example).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_explicit_data_dir() {
        let mut config = AppConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/var/lib/tether"));
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/var/lib/tether"));
    }
}

//! Platform capabilities
//!
//! The orchestrator never talks to hardware or network stacks directly. It
//! invokes these traits by name; the binary supplies simulated or real
//! implementations. Asynchronous outcomes (association, address
//! acquisition, session lifecycle) come back as [`Event`]s on the queue.

use crate::channel::EventSender;
use crate::provisioning::ProvisioningIntake;
use crate::session::SessionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tether_core::{Event, Result, StatusColor};
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Radio
// ----------------------------------------------------------------------------

/// Provisioning access point parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPointConfig {
    pub ssid: String,
    /// Empty selects an open access point
    pub password: String,
    pub max_connections: u8,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: "ESP32-Provisioning".to_string(),
            password: "password".to_string(),
            max_connections: 4,
        }
    }
}

impl AccessPointConfig {
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

/// One network found by a scan, serialized as the scan API's JSON items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub ssid: String,
    pub rssi: i8,
    pub authmode: u8,
}

/// Wireless driver primitives
///
/// Station lifecycle is reported asynchronously through the sender given to
/// [`attach`](Radio::attach): `StationStarted`, `Disassociated` and
/// `AddressAcquired`.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Hand the radio the orchestrator's event queue
    fn attach(&self, events: EventSender);

    /// Dual-role mode: access point plus station
    async fn start_access_point(&self, config: &AccessPointConfig) -> Result<()>;

    /// Load station credentials
    async fn configure_station(&self, ssid: &str, passphrase: &str) -> Result<()>;

    /// Start the station role; reports `StationStarted`
    async fn start_station(&self) -> Result<()>;

    /// Begin association; reports `AddressAcquired` or `Disassociated`
    async fn connect(&self) -> Result<()>;

    /// Drop the access point role
    async fn set_station_only(&self) -> Result<()>;

    /// Blocking scan; no other station operation may run concurrently
    async fn scan(&self) -> Result<Vec<ScanResult>>;
}

// ----------------------------------------------------------------------------
// Configuration Surface
// ----------------------------------------------------------------------------

/// The local configuration surface
#[async_trait]
pub trait Portal: Send + Sync {
    /// Start serving; submissions go through `intake`
    async fn start(&self, intake: ProvisioningIntake) -> Result<()>;

    /// Stop serving; stopping a stopped portal succeeds
    async fn stop(&self) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Reachability Probe
// ----------------------------------------------------------------------------

/// Post-association check that external name resolution works
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// `true` when the probe target resolved
    async fn probe(&self) -> bool;
}

/// Resolves a well-known host through the system resolver
#[derive(Debug, Clone)]
pub struct DnsProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl DnsProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self::new("www.google.com", 80, Duration::from_secs(5))
    }
}

#[async_trait]
impl ReachabilityProbe for DnsProbe {
    async fn probe(&self) -> bool {
        let target = self.target();
        let lookup =
            tokio::time::timeout(self.timeout, tokio::net::lookup_host(target.clone())).await;
        match lookup {
            Ok(Ok(mut addrs)) => {
                let resolved = addrs.next();
                debug!("Probe {} resolved to {:?}", target, resolved);
                resolved.is_some()
            }
            Ok(Err(e)) => {
                warn!("DNS lookup for {} failed: {}", target, e);
                false
            }
            Err(_) => {
                warn!("DNS lookup for {} timed out after {:?}", target, self.timeout);
                false
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Messaging
// ----------------------------------------------------------------------------

/// A started messaging session
///
/// The telemetry task only ever publishes through this handle; it never
/// reaches back into orchestrator state.
#[async_trait]
pub trait MessagingSession: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Whether the session has been torn down for good
    fn is_closed(&self) -> bool;
}

/// Wire-level messaging client
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start a session; lifecycle reports go to `events` as `Event::Session`
    async fn start(
        &self,
        config: SessionConfig,
        events: EventSender,
    ) -> Result<Arc<dyn MessagingSession>>;
}

// ----------------------------------------------------------------------------
// Status Indicator
// ----------------------------------------------------------------------------

/// Write-only tri-colour actuator
pub trait StatusIndicator: Send + Sync {
    fn set_rgb(&self, red: u8, green: u8, blue: u8);

    fn show(&self, color: StatusColor) {
        let (red, green, blue) = color.rgb();
        self.set_rgb(red, green, blue);
    }
}

/// Indicator that discards every write
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIndicator;

impl StatusIndicator for NullIndicator {
    fn set_rgb(&self, _red: u8, _green: u8, _blue: u8) {}
}

/// Forward a radio or session event, logging if the orchestrator is gone
pub async fn report(events: &EventSender, event: Event) {
    let name = event.name();
    if events.send(event).await.is_err() {
        debug!("Orchestrator stopped, dropping {}", name);
    }
}

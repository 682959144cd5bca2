//! Simulated wireless radio
//!
//! Joins only the networks listed in the simulation configuration, after a
//! configurable association delay. Lifecycle reports go to the orchestrator's
//! queue from spawned tasks, never from inside a capability call.

use crate::config::{SimulatedNetwork, SimulationConfig};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tether_core::{Event, Result, TetherError};
use tether_runtime::platform::report;
use tether_runtime::{AccessPointConfig, EventSender, Radio, ScanResult};
use tracing::{debug, info, warn};

const AUTH_OPEN: u8 = 0;
const AUTH_WPA2_PSK: u8 = 3;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Default)]
struct StationConfig {
    ssid: String,
    passphrase: String,
}

/// Radio backed by a list of known networks
pub struct SimulatedRadio {
    networks: Vec<SimulatedNetwork>,
    association_delay: Duration,
    drop_after: Option<Duration>,
    events: Mutex<Option<EventSender>>,
    station: Mutex<StationConfig>,
    access_point: AtomicBool,
    next_host: Arc<AtomicU8>,
    scan_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SimulatedRadio {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            networks: config.networks.clone(),
            association_delay: Duration::from_millis(config.association_delay_ms),
            drop_after: (config.drop_after_secs > 0)
                .then(|| Duration::from_secs(config.drop_after_secs)),
            events: Mutex::new(None),
            station: Mutex::new(StationConfig::default()),
            access_point: AtomicBool::new(false),
            next_host: Arc::new(AtomicU8::new(20)),
            scan_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Whether the provisioning access point is up
    pub fn access_point_active(&self) -> bool {
        self.access_point.load(Ordering::SeqCst)
    }

    fn sender(&self) -> Result<EventSender> {
        lock(&self.events)
            .clone()
            .ok_or_else(|| TetherError::platform_error("radio used before attach"))
    }

    /// Outcome of joining with the current station configuration
    fn association_outcome(&self) -> std::result::Result<(), String> {
        let station = lock(&self.station).clone();
        match self.networks.iter().find(|n| n.ssid == station.ssid) {
            None => Err(format!("no AP found for {:?}", station.ssid)),
            Some(network) if network.passphrase != station.passphrase => {
                Err("4-way handshake timeout".to_string())
            }
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Radio for SimulatedRadio {
    fn attach(&self, events: EventSender) {
        *lock(&self.events) = Some(events);
    }

    async fn start_access_point(&self, config: &AccessPointConfig) -> Result<()> {
        self.access_point.store(true, Ordering::SeqCst);
        info!(
            "[sim] Access point {:?} up ({}, max {} clients)",
            config.ssid,
            if config.is_open() { "open" } else { "WPA2-PSK" },
            config.max_connections
        );
        Ok(())
    }

    async fn configure_station(&self, ssid: &str, passphrase: &str) -> Result<()> {
        *lock(&self.station) = StationConfig {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
        };
        debug!("[sim] Station configured for {:?}", ssid);
        Ok(())
    }

    async fn start_station(&self) -> Result<()> {
        let events = self.sender()?;
        tokio::spawn(async move {
            report(&events, Event::StationStarted).await;
        });
        Ok(())
    }

    async fn connect(&self) -> Result<()> {
        let events = self.sender()?;
        let outcome = self.association_outcome();
        let delay = self.association_delay;
        let drop_after = self.drop_after;
        let next_host = self.next_host.clone();
        let scan_lock = self.scan_lock.clone();

        tokio::spawn(async move {
            // Association waits for any scan in progress
            let _scan = scan_lock.lock().await;
            tokio::time::sleep(delay).await;

            match outcome {
                Ok(()) => {
                    let host = next_host.fetch_add(1, Ordering::SeqCst);
                    let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, host));
                    info!("[sim] Associated, got address {}", ip);
                    report(&events, Event::AddressAcquired { ip }).await;

                    if let Some(after) = drop_after {
                        tokio::time::sleep(after).await;
                        report(
                            &events,
                            Event::Disassociated {
                                reason: "beacon timeout".to_string(),
                            },
                        )
                        .await;
                    }
                }
                Err(reason) => {
                    warn!("[sim] Association failed: {}", reason);
                    report(&events, Event::Disassociated { reason }).await;
                }
            }
        });
        Ok(())
    }

    async fn set_station_only(&self) -> Result<()> {
        self.access_point.store(false, Ordering::SeqCst);
        info!("[sim] Access point down, station only");
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<ScanResult>> {
        let _exclusive = self.scan_lock.lock().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        Ok(self
            .networks
            .iter()
            .map(|network| ScanResult {
                ssid: network.ssid.clone(),
                rssi: network.rssi,
                authmode: if network.passphrase.is_empty() {
                    AUTH_OPEN
                } else {
                    AUTH_WPA2_PSK
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_runtime::create_event_channel;

    fn radio() -> SimulatedRadio {
        SimulatedRadio::new(&SimulationConfig {
            networks: vec![
                SimulatedNetwork {
                    ssid: "Home".to_string(),
                    passphrase: "password123".to_string(),
                    rssi: -40,
                },
                SimulatedNetwork {
                    ssid: "Cafe".to_string(),
                    passphrase: String::new(),
                    rssi: -80,
                },
            ],
            association_delay_ms: 0,
            drop_after_secs: 0,
        })
    }

    #[tokio::test]
    async fn test_known_network_acquires_address() {
        let radio = radio();
        let (tx, mut rx) = create_event_channel(8);
        radio.attach(tx);

        radio.configure_station("Home", "password123").await.unwrap();
        radio.connect().await.unwrap();

        assert!(matches!(rx.recv().await, Some(Event::AddressAcquired { .. })));
    }

    #[tokio::test]
    async fn test_wrong_passphrase_disassociates() {
        let radio = radio();
        let (tx, mut rx) = create_event_channel(8);
        radio.attach(tx);

        radio.configure_station("Home", "wrong").await.unwrap();
        radio.connect().await.unwrap();

        assert!(matches!(rx.recv().await, Some(Event::Disassociated { .. })));
    }

    #[tokio::test]
    async fn test_scan_reports_auth_modes() {
        let results = radio().scan().await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].authmode, AUTH_WPA2_PSK);
        assert_eq!(results[1].authmode, AUTH_OPEN);
        assert_eq!(results[1].rssi, -80);
    }

    #[tokio::test]
    async fn test_unattached_radio_errors() {
        assert!(radio().connect().await.is_err());
    }
}

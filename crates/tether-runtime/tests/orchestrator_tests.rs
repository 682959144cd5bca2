//! Orchestrator integration tests
//!
//! Drive a real orchestrator task through the recording capability doubles,
//! injecting radio events the way a driver would.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_core::certificate::{KEY_BACKUP_CERT, KEY_PRIMARY_CERT};
use tether_core::errors::StoreResult;
use tether_core::testing::MockTimeSource;
use tether_core::{
    BrokerAuth, CertificateManager, CertificateSource, ConnectionState, CredentialStore, Event,
    IdentityStore, ManagerConfig, MemoryStore, NetworkIdentity, SessionEvent, StatusColor,
};
use tether_runtime::testing::{
    eventually, within, FixedProbe, MockMessagingClient, MockPortal, MockRadio, RadioCall,
    RecordingIndicator,
};
use tether_runtime::{OrchestratorBuilder, TelemetryConfig};

/// Counts reads per slot over a shared memory store
struct CountingStore {
    inner: Arc<MemoryStore>,
    reads: Mutex<HashMap<(String, String), usize>>,
}

impl CountingStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            reads: Mutex::new(HashMap::new()),
        }
    }

    fn reads(&self, namespace: &str, key: &str) -> usize {
        let reads = self.reads.lock().unwrap();
        reads
            .get(&(namespace.to_string(), key.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, namespace: &str, key: &str) {
        let mut reads = self.reads.lock().unwrap();
        *reads
            .entry((namespace.to_string(), key.to_string()))
            .or_insert(0) += 1;
    }
}

impl CredentialStore for CountingStore {
    fn put_string(&self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        self.inner.put_string(namespace, key, value)
    }

    fn get_string(&self, namespace: &str, key: &str) -> StoreResult<String> {
        self.record(namespace, key);
        self.inner.get_string(namespace, key)
    }

    fn put_blob(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        self.inner.put_blob(namespace, key, value)
    }

    fn get_blob(&self, namespace: &str, key: &str, capacity: usize) -> StoreResult<Vec<u8>> {
        self.record(namespace, key);
        self.inner.get_blob(namespace, key, capacity)
    }

    fn erase_key(&self, namespace: &str, key: &str) -> StoreResult<()> {
        self.inner.erase_key(namespace, key)
    }

    fn erase_namespace(&self, namespace: &str) -> StoreResult<()> {
        self.inner.erase_namespace(namespace)
    }
}

struct Rig {
    store: Arc<MemoryStore>,
    radio: Arc<MockRadio>,
    portal: Arc<MockPortal>,
    client: Arc<MockMessagingClient>,
    indicator: Arc<RecordingIndicator>,
    probe: Arc<FixedProbe>,
}

impl Rig {
    fn new() -> Self {
        Self::with_client(MockMessagingClient::new())
    }

    fn with_client(client: MockMessagingClient) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            radio: Arc::new(MockRadio::new()),
            portal: Arc::new(MockPortal::new()),
            client: Arc::new(client),
            indicator: Arc::new(RecordingIndicator::new()),
            probe: Arc::new(FixedProbe::new(true)),
        }
    }

    fn builder(&self) -> OrchestratorBuilder {
        self.builder_over(self.store.clone())
    }

    fn builder_over(&self, store: Arc<dyn CredentialStore>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(store)
            .with_radio(self.radio.clone())
            .with_portal(self.portal.clone())
            .with_messaging(self.client.clone())
            .with_indicator(self.indicator.clone())
            .with_probe(self.probe.clone())
            .with_clock(Arc::new(MockTimeSource::new()))
            .with_telemetry(TelemetryConfig {
                enabled: false,
                ..TelemetryConfig::default()
            })
    }

    fn save_identity(&self, port: &str) {
        let identity =
            NetworkIdentity::new("Home", "secret", "broker.local", port, BrokerAuth::Anonymous)
                .unwrap();
        IdentityStore::new(self.store.clone()).save(&identity).unwrap();
    }
}

fn no_fallback() -> ManagerConfig {
    ManagerConfig {
        allow_development_fallback: false,
        ..ManagerConfig::default()
    }
}

fn address() -> Event {
    Event::AddressAcquired {
        ip: "192.168.4.20".parse::<IpAddr>().unwrap(),
    }
}

fn rgb(color: StatusColor) -> (u8, u8, u8) {
    color.rgb()
}

// ----------------------------------------------------------------------------
// Boot decision
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_boot_without_identity_enters_provisioning() {
    let rig = Rig::new();
    let handle = rig.builder().build_and_start().await.unwrap();

    assert!(eventually(|| rig.portal.is_serving()).await);
    assert_eq!(rig.portal.starts(), 1);
    assert_eq!(
        rig.radio.calls()[0],
        RadioCall::StartAccessPoint {
            ssid: "ESP32-Provisioning".to_string()
        }
    );
    assert_eq!(handle.status(), ConnectionState::Idle);
    assert!(eventually(|| rig.indicator.last() == Some(rgb(StatusColor::Provisioning))).await);

    handle.shutdown_and_wait().await.unwrap();
}

#[tokio::test]
async fn test_boot_with_identity_connects_directly() {
    let rig = Rig::new();
    rig.save_identity("1883");

    let handle = rig.builder().build_and_start().await.unwrap();

    assert!(eventually(|| rig.radio.count(&RadioCall::StartStation) == 1).await);
    assert_eq!(
        rig.radio.calls(),
        vec![
            RadioCall::ConfigureStation {
                ssid: "Home".to_string(),
                passphrase: "secret".to_string()
            },
            RadioCall::StartStation,
        ]
    );
    assert_eq!(rig.portal.starts(), 0);

    rig.radio.report(Event::StationStarted).await.unwrap();
    assert!(eventually(|| rig.radio.count(&RadioCall::Connect) == 1).await);
    assert!(eventually(|| rig.indicator.last() == Some(rgb(StatusColor::Connecting))).await);

    handle.shutdown_and_wait().await.unwrap();
    assert_eq!(rig.portal.starts(), 0);
}

// ----------------------------------------------------------------------------
// Association retry
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_each_disassociation_requests_one_association() {
    let rig = Rig::new();
    rig.save_identity("1883");
    let handle = rig.builder().build_and_start().await.unwrap();

    rig.radio.report(Event::StationStarted).await.unwrap();
    assert!(eventually(|| rig.radio.count(&RadioCall::Connect) == 1).await);

    for _ in 0..3 {
        rig.radio
            .report(Event::Disassociated {
                reason: "auth expired".to_string(),
            })
            .await
            .unwrap();
    }

    assert!(eventually(|| rig.radio.count(&RadioCall::Connect) == 4).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.radio.count(&RadioCall::Connect), 4);
    assert_eq!(handle.status(), ConnectionState::ConnectFailed);
    assert_eq!(rig.indicator.last(), Some(rgb(StatusColor::Error)));

    let stats = handle.shutdown_and_wait().await.unwrap();
    assert_eq!(stats.association_requests, 4);
}

// ----------------------------------------------------------------------------
// Provisioning submissions
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_plaintext_submission_starts_session_without_anchor() {
    let rig = Rig::new();
    let counting = Arc::new(CountingStore::new(rig.store.clone()));
    let handle = rig
        .builder_over(counting.clone())
        .with_manager_config(no_fallback())
        .build_and_start()
        .await
        .unwrap();
    assert!(eventually(|| rig.portal.is_serving()).await);
    let boot_primary_reads = counting.reads("cert_mgr", KEY_PRIMARY_CERT);
    let boot_backup_reads = counting.reads("cert_mgr", KEY_BACKUP_CERT);

    let intake = rig.portal.intake().unwrap();
    intake
        .submit_form("ssid=Home&password=&mqtt_host=h&mqtt_port=1883")
        .await
        .unwrap();

    let stored = IdentityStore::new(rig.store.clone()).load().unwrap().unwrap();
    assert_eq!(stored.passphrase, "");

    assert!(eventually(|| rig.radio.count(&RadioCall::Connect) == 1).await);
    assert!(rig.radio.calls().contains(&RadioCall::ConfigureStation {
        ssid: "Home".to_string(),
        passphrase: String::new()
    }));
    assert_eq!(handle.status(), ConnectionState::Connecting);

    rig.radio.report(address()).await.unwrap();
    assert!(eventually(|| rig.client.configs().len() == 1).await);

    let config = &rig.client.configs()[0];
    assert_eq!(config.uri, "mqtt://h:1883");
    assert!(config.trust_anchor.is_none());
    assert!(!config.skip_common_name_check);
    // The plaintext launch never asks the certificate manager for an anchor
    assert_eq!(counting.reads("cert_mgr", KEY_PRIMARY_CERT), boot_primary_reads);
    assert_eq!(counting.reads("cert_mgr", KEY_BACKUP_CERT), boot_backup_reads);

    assert_eq!(handle.status(), ConnectionState::Connected);
    assert_eq!(rig.portal.stops(), 1);
    assert_eq!(rig.radio.count(&RadioCall::SetStationOnly), 1);
    assert_eq!(rig.probe.calls(), 1);

    let stats = handle.shutdown_and_wait().await.unwrap();
    assert_eq!(stats.sessions_started, 1);
}

#[tokio::test]
async fn test_failed_persist_queues_nothing() {
    let rig = Rig::new();
    rig.store.fail_writes_to("wifi_creds", "ssid");
    let handle = rig.builder().build_and_start().await.unwrap();
    assert!(eventually(|| rig.portal.is_serving()).await);

    let result = handle
        .intake()
        .submit_form("ssid=Home&password=secret&mqtt_host=h&mqtt_port=1883")
        .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.status(), ConnectionState::Idle);
    assert_eq!(rig.radio.count(&RadioCall::Connect), 0);
    assert!(rig.portal.is_serving());
    assert!(!rig.store.contains("wifi_creds", "ssid"));

    handle.shutdown_and_wait().await.unwrap();
}

#[tokio::test]
async fn test_rejected_form_is_not_persisted() {
    let rig = Rig::new();
    let handle = rig.builder().build_and_start().await.unwrap();
    assert!(eventually(|| rig.portal.is_serving()).await);

    let intake = handle.intake();
    assert!(intake.submit_form("ssid=&mqtt_host=h&mqtt_port=1883").await.is_err());
    assert!(intake
        .submit_form("ssid=Home&password=x&mqtt_host=h&mqtt_port=99999")
        .await
        .is_err());

    let oversized = format!("ssid={}&mqtt_host=h&mqtt_port=1883", "a".repeat(256));
    assert!(intake.submit_form(&oversized).await.is_err());

    assert!(IdentityStore::new(rig.store.clone()).load().unwrap().is_none());
    handle.shutdown_and_wait().await.unwrap();
}

#[tokio::test]
async fn test_scan_goes_through_radio() {
    let rig = Rig::new();
    let handle = rig.builder().build_and_start().await.unwrap();

    let results = handle.intake().scan().await.unwrap();
    assert!(results.is_empty());
    assert_eq!(rig.radio.count(&RadioCall::Scan), 1);

    handle.shutdown_and_wait().await.unwrap();
}

// ----------------------------------------------------------------------------
// Secured session
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_encrypted_session_without_anchor_aborts() {
    let rig = Rig::new();
    rig.save_identity("8883");
    let handle = rig
        .builder()
        .with_manager_config(no_fallback())
        .build_and_start()
        .await
        .unwrap();

    rig.radio.report(Event::StationStarted).await.unwrap();
    rig.radio.report(address()).await.unwrap();

    assert!(eventually(|| rig.indicator.last() == Some(rgb(StatusColor::Error))).await);
    assert_eq!(handle.status(), ConnectionState::Connected);
    assert!(rig.client.configs().is_empty());

    // A later address acquisition does not retry the launch
    rig.radio.report(address()).await.unwrap();
    assert!(eventually(|| rig.probe.calls() == 2).await);

    let stats = handle.shutdown_and_wait().await.unwrap();
    assert_eq!(stats.sessions_aborted, 1);
    assert_eq!(stats.sessions_started, 0);
    assert!(rig.client.sessions().is_empty());
}

#[tokio::test]
async fn test_encrypted_session_uses_development_anchor() {
    let rig = Rig::new();
    rig.save_identity("8883");
    let handle = rig.builder().build_and_start().await.unwrap();

    rig.radio.report(Event::StationStarted).await.unwrap();
    rig.radio.report(address()).await.unwrap();
    assert!(eventually(|| rig.client.configs().len() == 1).await);

    let config = &rig.client.configs()[0];
    assert_eq!(config.uri, "mqtts://broker.local:8883");
    assert!(config.trust_anchor.is_some());
    assert!(config.skip_common_name_check);

    handle.shutdown_and_wait().await.unwrap();
}

#[tokio::test]
async fn test_boot_provisions_development_anchor() {
    let rig = Rig::new();
    let handle = rig.builder().build_and_start().await.unwrap();
    assert!(eventually(|| rig.portal.is_serving()).await);
    handle.shutdown_and_wait().await.unwrap();

    let mut manager = CertificateManager::new(rig.store.clone(), Arc::new(MockTimeSource::new()));
    manager.init(ManagerConfig::default()).unwrap();
    assert!(manager.is_certificate_valid());
    assert_eq!(
        manager.get_metadata().unwrap().source,
        CertificateSource::Development
    );
}

#[tokio::test]
async fn test_session_events_recolour_indicator() {
    let rig = Rig::new();
    rig.save_identity("1883");
    let handle = rig.builder().build_and_start().await.unwrap();

    rig.radio.report(Event::StationStarted).await.unwrap();
    rig.radio.report(address()).await.unwrap();

    // The mock client reports Connected right after start
    assert!(eventually(|| rig.client.sessions().len() == 1).await);
    assert!(eventually(|| rig.indicator.last() == Some(rgb(StatusColor::Connected))).await);

    handle
        .send_event(Event::Session(SessionEvent::Disconnected))
        .await
        .unwrap();
    assert!(eventually(|| rig.indicator.last() == Some(rgb(StatusColor::Connecting))).await);

    handle
        .send_event(Event::Session(SessionEvent::Error {
            message: "broker refused".to_string(),
        }))
        .await
        .unwrap();
    assert!(eventually(|| rig.indicator.last() == Some(rgb(StatusColor::Error))).await);
    assert_eq!(handle.status(), ConnectionState::Connected);

    handle.shutdown_and_wait().await.unwrap();
}

#[tokio::test]
async fn test_probe_failure_does_not_block_session() {
    let mut rig = Rig::new();
    rig.probe = Arc::new(FixedProbe::new(false));
    rig.save_identity("1883");
    let handle = rig.builder().build_and_start().await.unwrap();

    rig.radio.report(Event::StationStarted).await.unwrap();
    rig.radio.report(address()).await.unwrap();

    assert!(eventually(|| rig.client.configs().len() == 1).await);
    assert!(rig.indicator.writes().contains(&rgb(StatusColor::Error)));

    let stats = handle.shutdown_and_wait().await.unwrap();
    assert_eq!(stats.probes_failed, 1);
    assert_eq!(stats.sessions_started, 1);
}

#[tokio::test]
async fn test_telemetry_publishes_while_session_active() {
    let rig = Rig::new();
    rig.save_identity("1883");
    let handle = rig
        .builder()
        .with_telemetry(TelemetryConfig {
            enabled: true,
            interval_secs: 1,
            topic: "v1/devices/me/telemetry".to_string(),
        })
        .build_and_start()
        .await
        .unwrap();

    rig.radio.report(Event::StationStarted).await.unwrap();
    rig.radio.report(address()).await.unwrap();
    assert!(eventually(|| rig.client.sessions().len() == 1).await);

    let session = rig.client.sessions()[0].clone();
    assert!(eventually(|| !session.published().is_empty()).await);

    let (topic, payload) = session.published()[0].clone();
    assert_eq!(topic, "v1/devices/me/telemetry");
    let sample: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(sample["sequence"], 1);

    handle.shutdown_and_wait().await.unwrap();
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_shutdown_stops_active_portal() {
    let rig = Rig::new();
    let handle = rig.builder().build_and_start().await.unwrap();
    assert!(eventually(|| rig.portal.is_serving()).await);
    assert!(handle.is_running());

    within(handle.shutdown_and_wait()).await.unwrap().unwrap();
    assert_eq!(rig.portal.stops(), 1);
    assert!(!rig.portal.is_serving());
}

#[tokio::test]
async fn test_builder_requires_capabilities() {
    let store = Arc::new(MemoryStore::new());
    let result = OrchestratorBuilder::new(store).build_and_start().await;
    assert!(result.is_err());
}

//! Recording test doubles for the platform capabilities
//!
//! Available to this crate's tests and, through the `testing` feature, to
//! downstream crates. Each double records what the orchestrator asked of it;
//! the radio double can also report events the way a driver would.

use crate::channel::EventSender;
use crate::platform::{
    report, AccessPointConfig, MessagingClient, MessagingSession, Portal, Radio,
    ReachabilityProbe, ScanResult, StatusIndicator,
};
use crate::provisioning::ProvisioningIntake;
use crate::session::SessionConfig;
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_core::{Event, Result, SessionEvent, TetherError};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Await `future`, failing after two seconds
pub async fn within<T>(future: impl Future<Output = T>) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(2), future).await.ok()
}

// ----------------------------------------------------------------------------
// Radio
// ----------------------------------------------------------------------------

/// One call made on [`MockRadio`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    StartAccessPoint { ssid: String },
    ConfigureStation { ssid: String, passphrase: String },
    StartStation,
    Connect,
    SetStationOnly,
    Scan,
}

/// Radio that records calls and reports only what the test tells it to
#[derive(Default)]
pub struct MockRadio {
    calls: Mutex<Vec<RadioCall>>,
    events: Mutex<Option<EventSender>>,
    scan_results: Mutex<Vec<ScanResult>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_results(self, results: Vec<ScanResult>) -> Self {
        *lock(&self.scan_results) = results;
        self
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &RadioCall) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    /// Report an event as the driver would
    pub async fn report(&self, event: Event) -> Result<()> {
        let sender = lock(&self.events)
            .clone()
            .ok_or_else(|| TetherError::channel_error("radio not attached"))?;
        report(&sender, event).await;
        Ok(())
    }

    fn record(&self, call: RadioCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl Radio for MockRadio {
    fn attach(&self, events: EventSender) {
        *lock(&self.events) = Some(events);
    }

    async fn start_access_point(&self, config: &AccessPointConfig) -> Result<()> {
        self.record(RadioCall::StartAccessPoint {
            ssid: config.ssid.clone(),
        });
        Ok(())
    }

    async fn configure_station(&self, ssid: &str, passphrase: &str) -> Result<()> {
        self.record(RadioCall::ConfigureStation {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
        });
        Ok(())
    }

    async fn start_station(&self) -> Result<()> {
        self.record(RadioCall::StartStation);
        Ok(())
    }

    async fn connect(&self) -> Result<()> {
        self.record(RadioCall::Connect);
        Ok(())
    }

    async fn set_station_only(&self) -> Result<()> {
        self.record(RadioCall::SetStationOnly);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<ScanResult>> {
        self.record(RadioCall::Scan);
        Ok(lock(&self.scan_results).clone())
    }
}

// ----------------------------------------------------------------------------
// Portal
// ----------------------------------------------------------------------------

/// Configuration surface that keeps the intake it was started with
#[derive(Default)]
pub struct MockPortal {
    starts: AtomicUsize,
    stops: AtomicUsize,
    intake: Mutex<Option<ProvisioningIntake>>,
}

impl MockPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_serving(&self) -> bool {
        lock(&self.intake).is_some()
    }

    /// The intake handed over by the last start
    pub fn intake(&self) -> Option<ProvisioningIntake> {
        lock(&self.intake).clone()
    }
}

#[async_trait]
impl Portal for MockPortal {
    async fn start(&self, intake: ProvisioningIntake) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.intake) = Some(intake);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        lock(&self.intake).take();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Probe and Indicator
// ----------------------------------------------------------------------------

/// Probe with a fixed answer
#[derive(Debug)]
pub struct FixedProbe {
    reachable: bool,
    calls: AtomicUsize,
}

impl FixedProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for FixedProbe {
    async fn probe(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reachable
    }
}

/// Indicator that remembers every colour written
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    writes: Mutex<Vec<(u8, u8, u8)>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(u8, u8, u8)> {
        lock(&self.writes).clone()
    }

    pub fn last(&self) -> Option<(u8, u8, u8)> {
        lock(&self.writes).last().copied()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn set_rgb(&self, red: u8, green: u8, blue: u8) {
        lock(&self.writes).push((red, green, blue));
    }
}

// ----------------------------------------------------------------------------
// Messaging
// ----------------------------------------------------------------------------

/// Session that records publishes
#[derive(Debug, Default)]
pub struct MockSession {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    closed: AtomicBool,
}

impl MockSession {
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.published).clone()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingSession for MockSession {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(TetherError::platform_error("session closed"));
        }
        lock(&self.published).push((topic.to_string(), payload));
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Messaging client that records every session configuration it receives
#[derive(Default)]
pub struct MockMessagingClient {
    configs: Mutex<Vec<SessionConfig>>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
    failure: Mutex<Option<String>>,
}

impl MockMessagingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every start fail with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        let client = Self::default();
        *lock(&client.failure) = Some(reason.into());
        client
    }

    pub fn configs(&self) -> Vec<SessionConfig> {
        lock(&self.configs).clone()
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        lock(&self.sessions).clone()
    }
}

#[async_trait]
impl MessagingClient for MockMessagingClient {
    async fn start(
        &self,
        config: SessionConfig,
        events: EventSender,
    ) -> Result<Arc<dyn MessagingSession>> {
        lock(&self.configs).push(config);
        if let Some(reason) = lock(&self.failure).clone() {
            return Err(TetherError::platform_error(reason));
        }

        let session = Arc::new(MockSession::default());
        lock(&self.sessions).push(session.clone());

        tokio::spawn(async move {
            report(&events, Event::Session(SessionEvent::Connected)).await;
        });
        Ok(session)
    }
}

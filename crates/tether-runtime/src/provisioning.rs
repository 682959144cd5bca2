//! Provisioning intake
//!
//! The only path from the configuration surface into the orchestrator. A
//! submission is parsed, validated and persisted on the caller's task; only
//! then is a bare `ConnectRequested` queued. No identity data crosses the
//! queue: the orchestrator re-reads the credential store.

use crate::channel::{try_send_event, EventSender};
use crate::platform::{Radio, ScanResult};
use std::sync::Arc;
use tether_core::{
    ConnectionState, Event, IdentityStore, NetworkIdentity, Result, StatusReader,
};
use tracing::{info, warn};

/// Acknowledgement returned for an accepted submission
pub const SUBMISSION_ACK: &str = "Wi-Fi credentials received. Attempting to connect...";

/// Handle given to the configuration surface
#[derive(Clone)]
pub struct ProvisioningIntake {
    identities: IdentityStore,
    events: EventSender,
    status: StatusReader,
    radio: Arc<dyn Radio>,
}

impl ProvisioningIntake {
    pub fn new(
        identities: IdentityStore,
        events: EventSender,
        status: StatusReader,
        radio: Arc<dyn Radio>,
    ) -> Self {
        Self {
            identities,
            events,
            status,
            radio,
        }
    }

    /// Handle a URL-encoded form body
    ///
    /// Persist failures fail the submission and nothing is queued; the device
    /// stays in provisioning.
    pub async fn submit_form(&self, body: &str) -> Result<()> {
        let identity = NetworkIdentity::from_form(body).map_err(|e| {
            warn!("Rejected provisioning submission: {}", e);
            e
        })?;
        self.submit(identity).await
    }

    /// Persist a validated identity and request a connection
    ///
    /// Never waits for queue room. A full queue fails the submission and the
    /// identity stays persisted for the next boot.
    pub async fn submit(&self, identity: NetworkIdentity) -> Result<()> {
        info!("Received SSID: {}", identity.ssid);
        self.identities.save(&identity)?;
        try_send_event(&self.events, Event::ConnectRequested).map_err(|e| {
            warn!("Connect request not queued: {}", e);
            e
        })
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionState {
        self.status.get()
    }

    /// Scan for nearby networks
    pub async fn scan(&self) -> Result<Vec<ScanResult>> {
        let results = self.radio.scan().await?;
        if results.is_empty() {
            info!("No APs found");
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::create_event_channel;
    use crate::testing::{within, MockRadio};
    use tether_core::{MemoryStore, StatusRegister, TetherError};

    fn intake(capacity: usize) -> (ProvisioningIntake, crate::channel::EventReceiver) {
        let (tx, rx) = create_event_channel(capacity);
        let (_writer, reader) = StatusRegister::pair();
        let intake = ProvisioningIntake::new(
            IdentityStore::new(Arc::new(MemoryStore::new())),
            tx,
            reader,
            Arc::new(MockRadio::new()),
        );
        (intake, rx)
    }

    const FORM: &str = "ssid=Home&password=pw&mqtt_host=h&mqtt_port=1883";

    #[tokio::test]
    async fn test_submission_queues_connect_request() {
        let (intake, mut rx) = intake(4);
        intake.submit_form(FORM).await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::ConnectRequested));
    }

    #[tokio::test]
    async fn test_full_queue_fails_submission_without_waiting() {
        let (intake, mut rx) = intake(1);
        intake.submit_form(FORM).await.unwrap();

        // Nobody drains the queue; the second submission must not block
        let second = within(intake.submit_form(FORM)).await;
        assert!(matches!(second, Some(Err(TetherError::Channel { .. }))));

        assert_eq!(rx.recv().await, Some(Event::ConnectRequested));
        assert!(rx.try_recv().is_err());
    }
}

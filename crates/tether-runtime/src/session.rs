//! Secured session launch
//!
//! Reads the endpoint bundle from the credential store, picks the transport
//! from the port, obtains a trust anchor for encrypted transports and hands
//! the result to the messaging client. Failing to obtain a trust anchor is
//! terminal for this boot cycle: the launcher logs a remediation checklist
//! and does not retry.

use crate::channel::EventSender;
use crate::platform::{MessagingClient, MessagingSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tether_core::certificate::MAX_CERT_SIZE;
use tether_core::identity::BrokerAuth;
use tether_core::{CertificateManager, IdentityStore, TetherError};
use tracing::{error, info, warn};

/// Steps printed when an encrypted session cannot get a trust anchor
pub const REMEDIATION_STEPS: [&str; 4] = [
    "Reinitialize credential storage",
    "Re-provision the trust anchor through the configuration surface",
    "Verify the certificate has not expired",
    "Verify certificate storage integrity",
];

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Everything the messaging client needs to start a session
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// `mqtt://host:1883` or `mqtts://host:port`
    pub uri: String,
    pub credentials: BrokerAuth,
    /// Trust anchor PEM, present for encrypted transports only
    pub trust_anchor: Option<String>,
    /// Trust the pinned CA without matching the server hostname against the
    /// certificate subject. Intentional; flag in security review.
    pub skip_common_name_check: bool,
}

impl SessionConfig {
    pub fn is_encrypted(&self) -> bool {
        self.trust_anchor.is_some()
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("uri", &self.uri)
            .field("credentials", &self.credentials)
            .field("trust_anchor", &self.trust_anchor.as_ref().map(|pem| pem.len()))
            .field("skip_common_name_check", &self.skip_common_name_check)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Session Launcher
// ----------------------------------------------------------------------------

/// Builds a [`SessionConfig`] and starts the messaging client
pub struct SessionLauncher {
    identities: IdentityStore,
    client: Arc<dyn MessagingClient>,
}

impl SessionLauncher {
    pub fn new(identities: IdentityStore, client: Arc<dyn MessagingClient>) -> Self {
        Self { identities, client }
    }

    /// Resolve the session configuration without starting anything
    pub fn prepare(&self, certificates: &CertificateManager) -> Result<SessionConfig, TetherError> {
        let endpoint = self.identities.broker_endpoint()?;
        let uri = endpoint.uri();

        if !endpoint.is_encrypted() {
            info!("Using unencrypted transport {}", uri);
            return Ok(SessionConfig {
                uri,
                credentials: endpoint.auth,
                trust_anchor: None,
                skip_common_name_check: false,
            });
        }

        let anchor = match certificates.load(MAX_CERT_SIZE) {
            Ok(anchor) => anchor,
            Err(e) => {
                error!("Failed to load trust anchor for {}: {}", uri, e);
                error!("Remediation checklist:");
                for (index, step) in REMEDIATION_STEPS.iter().enumerate() {
                    error!("  {}. {}", index + 1, step);
                }
                return Err(e.into());
            }
        };

        info!(
            "Using encrypted transport {} with {} trust anchor ({} bytes)",
            uri,
            anchor.source.source_name(),
            anchor.size
        );
        warn!("Hostname verification against the certificate subject is disabled");

        Ok(SessionConfig {
            uri,
            credentials: endpoint.auth,
            trust_anchor: Some(anchor.pem),
            skip_common_name_check: true,
        })
    }

    /// Prepare and start a session
    pub async fn launch(
        &self,
        certificates: &CertificateManager,
        events: EventSender,
    ) -> Result<Arc<dyn MessagingSession>, TetherError> {
        let config = self.prepare(certificates)?;
        let uri = config.uri.clone();
        let session = self.client.start(config, events).await?;
        info!("Messaging session started for {}", uri);
        Ok(session)
    }
}

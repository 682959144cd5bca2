//! Logging messaging client
//!
//! Stands in for the wire-level messaging client when running on a host.
//! Sessions start immediately and publishes are written to the log.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tether_core::{Event, Result, SessionEvent, TetherError};
use tether_runtime::platform::report;
use tether_runtime::{EventSender, MessagingClient, MessagingSession, SessionConfig};
use tracing::info;

/// Session that logs every publish
#[derive(Debug)]
pub struct LoggingSession {
    uri: String,
    published: AtomicU64,
    closed: AtomicBool,
}

impl LoggingSession {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingSession for LoggingSession {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(TetherError::platform_error("session closed"));
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        info!(
            "[sim] {} <- {}: {}",
            self.uri,
            topic,
            String::from_utf8_lossy(&payload)
        );
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Messaging client producing [`LoggingSession`]s
#[derive(Debug, Default)]
pub struct LoggingMessagingClient;

#[async_trait]
impl MessagingClient for LoggingMessagingClient {
    async fn start(
        &self,
        config: SessionConfig,
        events: EventSender,
    ) -> Result<Arc<dyn MessagingSession>> {
        info!("[sim] Starting messaging session: {:?}", config);
        if let Some(anchor) = &config.trust_anchor {
            let fingerprint = tether_core::certificate::fingerprint(anchor)
                .unwrap_or_else(|| "unknown".to_string());
            info!("[sim] Pinned trust anchor fingerprint {}", fingerprint);
        }

        let session = Arc::new(LoggingSession {
            uri: config.uri,
            published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        tokio::spawn(async move {
            report(&events, Event::Session(SessionEvent::Connected)).await;
        });
        Ok(session)
    }
}

//! HTTP configuration surface
//!
//! Implements the runtime's [`Portal`] capability with axum. Each start binds
//! a fresh listener; stop sends the oneshot shutdown signal and waits up to
//! [`DRAIN_TIMEOUT`] for the server to drain.

pub mod routes;

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tether_core::{Result, TetherError};
use tether_runtime::{Portal, ProvisioningIntake};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Longest wait for in-flight requests when stopping
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// axum-backed configuration surface
pub struct HttpPortal {
    listen: SocketAddr,
    server: Mutex<Option<RunningServer>>,
}

impl HttpPortal {
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            server: Mutex::new(None),
        }
    }

    /// Bound address while serving; resolves port 0 to the real port
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|s| s.local_addr)
    }
}

#[async_trait]
impl Portal for HttpPortal {
    async fn start(&self, intake: ProvisioningIntake) -> Result<()> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            warn!("Configuration surface already running");
            return Ok(());
        }

        let listener = TcpListener::bind(self.listen).await.map_err(|e| {
            TetherError::platform_error(format!("failed to bind {}: {}", self.listen, e))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TetherError::platform_error(format!("listener address: {}", e)))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = routes::router(intake);

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                    info!("Configuration surface shutting down gracefully");
                })
                .await;
            if let Err(e) = served {
                error!("Configuration surface error: {}", e);
            }
        });

        info!("Configuration surface listening on http://{}", local_addr);
        *server = Some(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(running) = self.server.lock().await.take() else {
            return Ok(());
        };

        if running.shutdown.send(()).is_err() {
            warn!("Configuration surface already exited");
        }
        let mut task = running.task;
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Configuration surface task ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "Configuration surface did not drain within {:?}, aborting",
                    DRAIN_TIMEOUT
                );
                task.abort();
            }
        }
        Ok(())
    }
}

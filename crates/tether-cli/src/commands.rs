//! Command handlers for the Tether CLI

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use tether_core::certificate::{fingerprint, MAX_CERT_SIZE};
use tether_core::{
    BrokerAuth, CertificateManager, CredentialStore, FileStore, IdentityStore,
    MonotonicTimeSource, NetworkIdentity,
};
use tether_runtime::{OrchestratorBuilder, OrchestratorHandle};

use crate::cli::{CertCommand, Cli, Commands, ProvisionArgs, SourceArg};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::portal::HttpPortal;
use crate::sim::{ConsoleIndicator, LoggingMessagingClient, SimulatedRadio};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        if let Commands::Config = cli.command {
            print!("{}", AppConfig::example_config()?);
            return Ok(());
        }

        let data_dir = config.data_dir()?;
        info!("Using data directory {}", data_dir.display());
        let store: Arc<dyn CredentialStore> = Arc::new(FileStore::open(data_dir)?);

        match cli.command {
            Commands::Run { listen } => Self::handle_run(&config, store, listen).await,
            Commands::Provision(args) => Self::handle_provision(&config, store, args),
            Commands::Reset { keep_certificates } => {
                Self::handle_reset(&config, store, keep_certificates)
            }
            Commands::Cert(command) => Self::handle_cert(&config, store, command),
            Commands::Config => Ok(()),
        }
    }

    /// Boot against simulated capabilities until Ctrl-C
    async fn handle_run(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        listen: Option<SocketAddr>,
    ) -> Result<()> {
        let listen = listen.unwrap_or(config.portal.listen);

        let handle = OrchestratorBuilder::new(store)
            .with_radio(Arc::new(SimulatedRadio::new(&config.simulation)))
            .with_portal(Arc::new(HttpPortal::new(listen)))
            .with_messaging(Arc::new(LoggingMessagingClient))
            .with_indicator(Arc::new(ConsoleIndicator::new()))
            .with_probe(Arc::new(config.probe()))
            .with_manager_config(config.certificates.clone())
            .with_identity_namespace(config.storage.credentials_namespace.clone())
            .with_config(config.runtime_config())
            .build_and_start()
            .await?;

        info!("Device running, press Ctrl-C to stop");
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received");
            }
            _ = Self::stopped(&handle) => {
                info!("Orchestrator exited on its own");
            }
        }

        let stats = handle.shutdown_and_wait().await?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        Ok(())
    }

    async fn stopped(handle: &OrchestratorHandle) {
        while handle.is_running() {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Persist an identity offline
    fn handle_provision(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        args: ProvisionArgs,
    ) -> Result<()> {
        let auth = match (args.user, args.pass, args.token) {
            (Some(username), Some(password), None) => BrokerAuth::UserPassword { username, password },
            (None, None, Some(token)) => BrokerAuth::DeviceToken(token),
            (None, None, None) => BrokerAuth::Anonymous,
            _ => {
                return Err(CliError::InvalidArgument(
                    "use either --user/--pass or --token".to_string(),
                ))
            }
        };

        let identity = NetworkIdentity::new(args.ssid, args.password, args.host, &args.port, auth)?;
        let identities =
            IdentityStore::with_namespace(store, config.storage.credentials_namespace.clone());
        identities.save(&identity)?;

        println!(
            "Provisioned {:?} -> {}",
            identity.ssid,
            identity.broker.uri()
        );
        Ok(())
    }

    /// Erase credentials, and certificates unless asked to keep them
    fn handle_reset(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        keep_certificates: bool,
    ) -> Result<()> {
        IdentityStore::with_namespace(store.clone(), config.storage.credentials_namespace.clone())
            .clear()?;
        println!("Network identity erased");

        if !keep_certificates {
            store.erase_namespace(&config.certificates.namespace)?;
            println!("Certificate slots erased");
        }
        Ok(())
    }

    fn handle_cert(
        config: &AppConfig,
        store: Arc<dyn CredentialStore>,
        command: CertCommand,
    ) -> Result<()> {
        let mut manager = CertificateManager::new(store, Arc::new(MonotonicTimeSource::new()));
        manager.init(config.certificates.clone())?;

        let result = match command {
            CertCommand::Show => Self::show_certificate(&manager),
            CertCommand::Install { file, source } => Self::install_certificate(&manager, file, source),
            CertCommand::Check => {
                if manager.is_certificate_valid() {
                    println!("Trust anchor is valid");
                    Ok(())
                } else {
                    Err(CliError::CheckFailed(
                        "no valid trust anchor available".to_string(),
                    ))
                }
            }
        };

        manager.deinit();
        result
    }

    fn show_certificate(manager: &CertificateManager) -> Result<()> {
        let loaded = manager.load(MAX_CERT_SIZE)?;
        println!("Effective trust anchor");
        println!("  Source:      {}", loaded.source);
        println!("  Size:        {} bytes", loaded.size);
        println!(
            "  Fingerprint: {}",
            fingerprint(&loaded.pem).unwrap_or_else(|| "unavailable".to_string())
        );
        println!("  Validation:  {}", manager.validate(&loaded.pem)?);

        match manager.get_metadata() {
            Ok(metadata) => {
                println!("Primary slot metadata");
                println!("  Source:      {}", metadata.source);
                println!("  Checksum:    {:08x}", metadata.checksum);
                println!("  Stored at:   {}", metadata.stored_at);
                println!("  Expires at:  {} (placeholder)", metadata.expires_at);
                println!("  Size:        {} bytes", metadata.size_bytes);
            }
            Err(e) => println!("No primary slot metadata: {}", e),
        }
        Ok(())
    }

    fn install_certificate(
        manager: &CertificateManager,
        file: std::path::PathBuf,
        source: SourceArg,
    ) -> Result<()> {
        let pem = std::fs::read_to_string(&file)?;
        manager.rotate(&pem, source.into())?;
        println!(
            "Installed {} as primary trust anchor (fingerprint {})",
            file.display(),
            fingerprint(&pem).unwrap_or_else(|| "unavailable".to_string())
        );
        Ok(())
    }
}

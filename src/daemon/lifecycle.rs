// Daemon lifecycle management
//
// NOT_STARTED -> STARTING -> CONNECTING -> READY, FAILED from the middle two.
// The spawned process and its RPC stub live and die together in DaemonHandle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::DaemonConfig;
use super::spawn::{check_alive, discover_port, last_log_message, launch, terminate, write_config_file};
use crate::errors::{Error, Result};
use crate::rpc::{Connector, GrpcConnector, TransferService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotStarted,
    Starting,
    Connecting,
    Ready,
    Failed,
}

/// A running daemon and the stub connected to it
pub struct DaemonHandle {
    service: Box<dyn TransferService>,
    process: Child,
    port: u16,
    log_path: PathBuf,
}

impl DaemonHandle {
    pub fn service(&mut self) -> &mut dyn TransferService {
        self.service.as_mut()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Release the stub, then stop the process and wait for it
    pub async fn shutdown(self) {
        let DaemonHandle {
            service,
            mut process,
            port,
            ..
        } = self;
        drop(service);
        info!(port, pid = ?process.id(), "Shutting down daemon");
        terminate(&mut process).await;
    }
}

/// Starts the daemon on demand and keeps one connection to it
pub struct DaemonSupervisor {
    config: DaemonConfig,
    connector: Arc<dyn Connector>,
    state: DaemonState,
    handle: Option<DaemonHandle>,
}

impl DaemonSupervisor {
    /// Supervisor connecting over gRPC
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let connector = GrpcConnector::new(config.connect_interval());
        Self::with_connector(config, Arc::new(connector))
    }

    pub fn with_connector(config: DaemonConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            state: DaemonState::NotStarted,
            handle: None,
        })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.handle.is_some()
    }

    /// Port of the connected daemon
    pub fn port(&self) -> Option<u16> {
        self.handle.as_ref().map(DaemonHandle::port)
    }

    /// Start and connect to the daemon unless already connected
    pub async fn ensure_ready(&mut self) -> Result<&mut DaemonHandle> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.start().await?,
        };
        Ok(self.handle.insert(handle))
    }

    async fn start(&mut self) -> Result<DaemonHandle> {
        self.state = DaemonState::Starting;
        match self.spawn_and_connect().await {
            Ok(handle) => {
                self.state = DaemonState::Ready;
                Ok(handle)
            }
            Err(e) => {
                self.state = DaemonState::Failed;
                Err(e)
            }
        }
    }

    async fn spawn_and_connect(&mut self) -> Result<DaemonHandle> {
        let files = self.config.files();
        write_config_file(&self.config, &files)?;

        info!(executable = %self.config.executable.display(), "Starting daemon");
        let mut process = launch(&self.config, &files)?;
        check_alive(&mut process, self.config.startup_grace(), &files.log).await?;
        info!(pid = ?process.id(), "Daemon started");

        let port = if self.config.port == 0 {
            match last_log_message(&files.log).as_deref().and_then(discover_port) {
                Some(port) => {
                    info!(port, "Allocated server port");
                    port
                }
                None => {
                    terminate(&mut process).await;
                    return Err(Error::PortDiscovery);
                }
            }
        } else {
            self.config.port
        };

        self.state = DaemonState::Connecting;
        let service = match self.connect(port).await {
            Ok(service) => service,
            Err(e) => {
                terminate(&mut process).await;
                return Err(e);
            }
        };

        Ok(DaemonHandle {
            service,
            process,
            port,
            log_path: files.log,
        })
    }

    async fn connect(&self, port: u16) -> Result<Box<dyn TransferService>> {
        let address = &self.config.address;
        let attempts = self.config.connect_attempts;
        let interval = self.config.connect_interval();
        info!(address = %address, port, "Connecting to daemon");

        // attempts start one interval apart, however long each one took
        for attempt in 1..=attempts {
            let attempt_started = Instant::now();
            match self.connector.connect(address, port).await {
                Ok(service) => {
                    info!(attempt, "Connected to daemon");
                    return Ok(service);
                }
                Err(e) => debug!(attempt, error = %e, "Daemon not reachable yet"),
            }
            if attempt < attempts {
                tokio::time::sleep(interval.saturating_sub(attempt_started.elapsed())).await;
            }
        }

        warn!(address = %address, port, attempts, "Failed to connect to daemon");
        Err(Error::ConnectionTimeout {
            address: format!("{address}:{port}"),
            attempts,
        })
    }

    /// Stop the daemon if one was started; a no-op otherwise
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown().await;
        }
        self.state = DaemonState::NotStarted;
    }
}

impl Drop for DaemonSupervisor {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            warn!(pid = ?handle.pid(), "Supervisor dropped without shutdown, killing daemon");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Fails every attempt after `delay`, like an address that never answers
    struct SlowConnector {
        delay: Duration,
    }

    #[async_trait]
    impl Connector for SlowConnector {
        async fn connect(&self, _address: &str, _port: u16) -> Result<Box<dyn TransferService>> {
            tokio::time::sleep(self.delay).await;
            Err(Error::Rpc(tonic::Status::deadline_exceeded("no reply")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempts_do_not_stretch_connect_window() {
        let config = DaemonConfig {
            connect_attempts: 4,
            connect_interval_ms: 1000,
            ..Default::default()
        };
        let connector = SlowConnector {
            delay: Duration::from_millis(900),
        };
        let supervisor = DaemonSupervisor::with_connector(config, Arc::new(connector)).unwrap();

        let started = Instant::now();
        let result = supervisor.connect(40123).await;

        assert!(matches!(
            result,
            Err(Error::ConnectionTimeout { attempts: 4, .. })
        ));
        // three full intervals plus the last 900 ms attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3900), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
    }

    #[test]
    fn test_invalid_config_rejected_before_start() {
        let config = DaemonConfig {
            address: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            DaemonSupervisor::new(config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_without_start_is_noop() {
        let mut supervisor = DaemonSupervisor::new(DaemonConfig::default()).unwrap();
        assert_eq!(supervisor.state(), DaemonState::NotStarted);
        supervisor.shutdown().await;
        supervisor.shutdown().await;
        assert_eq!(supervisor.state(), DaemonState::NotStarted);
        assert!(!supervisor.is_ready());
        assert_eq!(supervisor.port(), None);
    }

    #[tokio::test]
    async fn test_missing_executable_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig {
            executable: dir.path().join("absent-daemon"),
            log_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut supervisor = DaemonSupervisor::new(config).unwrap();
        let result = supervisor.ensure_ready().await;
        assert!(matches!(result, Err(Error::DaemonStartup { .. })));
        assert_eq!(supervisor.state(), DaemonState::Failed);
    }
}

// Transfer submission and status polling
//
// Sleep, query, classify. The first query happens one interval after the
// call, so a sequence of N statuses costs N queries and N intervals.

use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{TransferId, TransferSpec, TransferStatus};
use crate::daemon::last_file_line;
use crate::errors::{Error, Result};
use crate::rpc::{StartTransferRequest, TransferService, TRANSFER_LOG_LEVEL};

/// Polling cadence and optional overall deadline
#[derive(Debug, Clone, PartialEq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Give up with `PollDeadline` once this much time has elapsed
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// Drives one transfer through a connected daemon
pub struct TransferRpcClient<'a> {
    service: &'a mut dyn TransferService,
    log_level: i32,
    poll: PollOptions,
    daemon_log: Option<PathBuf>,
}

impl<'a> TransferRpcClient<'a> {
    pub fn new(service: &'a mut dyn TransferService) -> Self {
        Self {
            service,
            log_level: TRANSFER_LOG_LEVEL,
            poll: PollOptions::default(),
            daemon_log: None,
        }
    }

    pub fn with_log_level(mut self, log_level: i32) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    /// Daemon log whose last line is attached to `TransferFailed`
    pub fn with_daemon_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.daemon_log = Some(path.into());
        self
    }

    /// Submit `spec` and return the daemon-assigned id
    pub async fn start(&mut self, spec: &TransferSpec) -> Result<TransferId> {
        let transfer_spec = spec.to_json()?;
        debug!(transfer_spec = %transfer_spec, "Submitting transfer");

        let reply = self
            .service
            .start_transfer(StartTransferRequest {
                log_level: self.log_level,
                transfer_spec,
            })
            .await?;

        match reply.status {
            TransferStatus::Failed | TransferStatus::Unknown => {
                let description = reply.description();
                error!(status = %reply.status, description = %description, "Transfer rejected");
                Err(Error::TransferRejected { description })
            }
            status => {
                info!(transfer_id = %reply.transfer_id, status = %status, "Transfer started");
                Ok(TransferId::new(reply.transfer_id))
            }
        }
    }

    /// Poll until the transfer reaches a terminal status
    pub async fn await_completion(&mut self, id: &TransferId) -> Result<()> {
        self.await_completion_with(id, &CancellationToken::new())
            .await
    }

    /// Poll until terminal status, cancellation or deadline.
    ///
    /// Cancelling stops polling only; the daemon keeps running the transfer.
    pub async fn await_completion_with(
        &mut self,
        id: &TransferId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(transfer_id = %id, "Stopped waiting for transfer");
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(self.poll.interval) => {}
            }

            if let Some(deadline) = self.poll.deadline {
                if started.elapsed() >= deadline {
                    warn!(transfer_id = %id, ?deadline, "Transfer polling deadline reached");
                    return Err(Error::PollDeadline(deadline));
                }
            }

            let reply = self.service.query_transfer(id.as_str()).await?;
            info!(transfer_id = %id, status = %reply.status, "transfer");

            match reply.status {
                TransferStatus::Completed => return Ok(()),
                TransferStatus::Failed => {
                    let description = reply.description();
                    let daemon_log = self.last_daemon_log_line();
                    error!(transfer_id = %id, description = %description, "Transfer failed");
                    return Err(Error::TransferFailed {
                        description,
                        daemon_log,
                    });
                }
                TransferStatus::Unknown => {
                    return Err(Error::UnknownTransferId {
                        transfer_id: id.to_string(),
                        description: reply.description(),
                    });
                }
                TransferStatus::Queued
                | TransferStatus::Running
                | TransferStatus::Canceled
                | TransferStatus::Paused
                | TransferStatus::Orphaned => {}
            }
        }
    }

    fn last_daemon_log_line(&self) -> Option<String> {
        let path = self.daemon_log.as_ref()?;
        match last_file_line(path) {
            Ok(line) if !line.is_empty() => Some(line),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read daemon log");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{DaemonError, TransferReply};
    use async_trait::async_trait;

    struct FixedReply(TransferStatus);

    #[async_trait]
    impl TransferService for FixedReply {
        async fn start_transfer(&mut self, _: StartTransferRequest) -> Result<TransferReply> {
            Ok(TransferReply {
                transfer_id: "t-1".to_string(),
                status: self.0,
                error: Some(DaemonError {
                    code: 1,
                    description: "bad spec".to_string(),
                }),
            })
        }

        async fn query_transfer(&mut self, transfer_id: &str) -> Result<TransferReply> {
            Ok(TransferReply {
                transfer_id: transfer_id.to_string(),
                status: self.0,
                error: Some(DaemonError {
                    code: 1,
                    description: "disk full".to_string(),
                }),
            })
        }
    }

    #[tokio::test]
    async fn test_start_accepts_queued() {
        let mut service = FixedReply(TransferStatus::Queued);
        let id = TransferRpcClient::new(&mut service)
            .start(&TransferSpec::new())
            .await
            .unwrap();
        assert_eq!(id.as_str(), "t-1");
    }

    #[tokio::test]
    async fn test_start_rejects_failed_and_unknown() {
        for status in [TransferStatus::Failed, TransferStatus::Unknown] {
            let mut service = FixedReply(status);
            let result = TransferRpcClient::new(&mut service)
                .start(&TransferSpec::new())
                .await;
            match result {
                Err(Error::TransferRejected { description }) => assert_eq!(description, "bad spec"),
                other => panic!("expected TransferRejected, got {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_attaches_last_daemon_log_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("transferd.log");
        std::fs::write(&log, "{\"msg\":\"starting\"}\n{\"msg\":\"ascp exited: 28\"}\n").unwrap();

        let mut service = FixedReply(TransferStatus::Failed);
        let result = TransferRpcClient::new(&mut service)
            .with_daemon_log(&log)
            .await_completion(&TransferId::new("t-1"))
            .await;
        match result {
            Err(Error::TransferFailed {
                description,
                daemon_log,
            }) => {
                assert_eq!(description, "disk full");
                assert_eq!(daemon_log.as_deref(), Some("{\"msg\":\"ascp exited: 28\"}"));
            }
            other => panic!("expected TransferFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_daemon_log_is_not_fatal() {
        let mut service = FixedReply(TransferStatus::Failed);
        let result = TransferRpcClient::new(&mut service)
            .with_daemon_log("/nonexistent/transferd.log")
            .await_completion(&TransferId::new("t-1"))
            .await;
        assert!(matches!(
            result,
            Err(Error::TransferFailed {
                daemon_log: None,
                ..
            })
        ));
    }
}

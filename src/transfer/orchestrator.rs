use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{PollOptions, TransferId, TransferRpcClient, TransferSpec};
use crate::daemon::DaemonSupervisor;
use crate::errors::{Error, Result};

/// Submit a spec and wait for its outcome, starting the daemon on first use.
///
/// One daemon instance serves every sequential `run`. Call `shutdown` when done;
/// dropping the orchestrator kills the daemon but skips the graceful stop.
pub struct TransferOrchestrator {
    supervisor: DaemonSupervisor,
    poll: PollOptions,
}

impl TransferOrchestrator {
    pub fn new(supervisor: DaemonSupervisor) -> Self {
        Self {
            supervisor,
            poll: PollOptions::default(),
        }
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn supervisor(&self) -> &DaemonSupervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut DaemonSupervisor {
        &mut self.supervisor
    }

    pub async fn run(&mut self, spec: &TransferSpec) -> Result<TransferId> {
        self.run_with_cancel(spec, &CancellationToken::new()).await
    }

    /// Like `run`, but stops with `Cancelled` when `cancel` fires.
    ///
    /// Cancelling while the daemon is still starting abandons the start and
    /// resets the supervisor. Once submitted, the transfer keeps running.
    pub async fn run_with_cancel(
        &mut self,
        spec: &TransferSpec,
        cancel: &CancellationToken,
    ) -> Result<TransferId> {
        let daemon_log = self.supervisor.config().files().log;

        // a daemon that is already up wins over a pending cancel
        let ready = tokio::select! {
            biased;
            ready = self.supervisor.ensure_ready() => ready.map(|_| ()),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };
        if let Err(e) = ready {
            if matches!(e, Error::Cancelled) {
                info!("Cancelled while starting daemon");
                self.supervisor.shutdown().await;
            }
            return Err(e);
        }
        let handle = self.supervisor.ensure_ready().await?;

        let mut client = TransferRpcClient::new(handle.service())
            .with_poll_options(self.poll.clone())
            .with_daemon_log(daemon_log);
        let id = tokio::select! {
            biased;
            id = client.start(spec) => id?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };
        client.await_completion_with(&id, cancel).await?;
        Ok(id)
    }

    /// Stop the daemon; safe to call repeatedly
    pub async fn shutdown(&mut self) {
        self.supervisor.shutdown().await;
    }
}

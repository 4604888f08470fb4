// Shared test doubles: scripted daemon stub, counting connector and fake
// daemon executables.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use transferd_client::auth::AuthContext;
use transferd_client::daemon::DaemonConfig;
use transferd_client::rpc::{
    Connector, DaemonError, StartTransferRequest, TransferReply, TransferService,
};
use transferd_client::transfer::TransferStatus;
use transferd_client::{Error, Result};

pub const TRANSFER_ID: &str = "xfer-1";

/// What the scripted daemon was asked
#[derive(Debug, Default)]
pub struct CallLog {
    pub starts: Vec<StartTransferRequest>,
    pub queries: Vec<(String, Instant)>,
}

impl CallLog {
    /// Time between consecutive queries
    pub fn query_gaps(&self) -> Vec<std::time::Duration> {
        self.queries
            .windows(2)
            .map(|pair| pair[1].1 - pair[0].1)
            .collect()
    }
}

/// Daemon stub answering queries from a fixed status sequence.
///
/// The last status repeats once the sequence is exhausted.
#[derive(Clone)]
pub struct ScriptedDaemon {
    start_status: TransferStatus,
    statuses: VecDeque<TransferStatus>,
    error_description: String,
    calls: Arc<Mutex<CallLog>>,
}

impl ScriptedDaemon {
    pub fn new(statuses: &[TransferStatus]) -> Self {
        Self {
            start_status: TransferStatus::Queued,
            statuses: statuses.iter().copied().collect(),
            error_description: "transfer error".to_string(),
            calls: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    pub fn with_start_status(mut self, status: TransferStatus) -> Self {
        self.start_status = status;
        self
    }

    pub fn with_error(mut self, description: &str) -> Self {
        self.error_description = description.to_string();
        self
    }

    pub fn calls(&self) -> Arc<Mutex<CallLog>> {
        self.calls.clone()
    }

    fn reply(&self, transfer_id: &str, status: TransferStatus) -> TransferReply {
        let error = matches!(status, TransferStatus::Failed | TransferStatus::Unknown).then(|| {
            DaemonError {
                code: 1,
                description: self.error_description.clone(),
            }
        });
        TransferReply {
            transfer_id: transfer_id.to_string(),
            status,
            error,
        }
    }
}

#[async_trait]
impl TransferService for ScriptedDaemon {
    async fn start_transfer(&mut self, request: StartTransferRequest) -> Result<TransferReply> {
        self.calls.lock().unwrap().starts.push(request);
        Ok(self.reply(TRANSFER_ID, self.start_status))
    }

    async fn query_transfer(&mut self, transfer_id: &str) -> Result<TransferReply> {
        self.calls
            .lock()
            .unwrap()
            .queries
            .push((transfer_id.to_string(), Instant::now()));
        let status = if self.statuses.len() > 1 {
            self.statuses.pop_front().unwrap()
        } else {
            self.statuses.front().copied().unwrap_or(TransferStatus::Unknown)
        };
        Ok(self.reply(transfer_id, status))
    }
}

/// Connector handing out clones of one scripted daemon.
///
/// The first `failures` attempts are refused.
pub struct CountingConnector {
    daemon: ScriptedDaemon,
    failures: u32,
    attempts: AtomicU32,
    ports: Mutex<Vec<u16>>,
}

impl CountingConnector {
    pub fn new(daemon: ScriptedDaemon) -> Arc<Self> {
        Self::failing(daemon, 0)
    }

    pub fn failing(daemon: ScriptedDaemon, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            daemon,
            failures,
            attempts: AtomicU32::new(0),
            ports: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn ports(&self) -> Vec<u16> {
        self.ports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, _address: &str, port: u16) -> Result<Box<dyn TransferService>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.ports.lock().unwrap().push(port);
        if attempt <= self.failures {
            return Err(Error::Rpc(tonic::Status::unavailable("connection refused")));
        }
        Ok(Box::new(self.daemon.clone()))
    }
}

/// Port the fake daemons claim to listen on
pub const FAKE_PORT: u16 = 40123;

/// Shell prologue: the daemon log lives next to the conf file given as `--config <conf>`.
/// `exec` keeps the pid, so the recorded pid is the long-running process.
const SCRIPT_PROLOGUE: &str = r#"#!/bin/sh
dir=$(dirname "$2")
log="$dir/$(basename "$0").log"
echo started >> "$dir/spawns"
echo $$ > "$dir/pid"
"#;

/// Daemon that logs its listening port and stays up
pub const LISTENING_DAEMON: &str = r#"echo '{"level":"info","msg":"starting"}' >> "$log"
echo '{"level":"info","msg":"listening on 127.0.0.1:40123 "}' >> "$log"
exec sleep 30
"#;

/// Daemon that fails to bind and exits at once
pub const CRASHING_DAEMON: &str = r#"echo '{"level":"error","msg":"bind: address already in use"}' >> "$log"
exit 3
"#;

/// Daemon that stays up without ever reporting a port
pub const SILENT_DAEMON: &str = r#"echo '{"level":"info","msg":"starting"}' >> "$log"
exec sleep 30
"#;

/// Write an executable fake daemon into `<root>/bin/<name>`
#[cfg(unix)]
pub fn write_fake_daemon(root: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bin = root.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let path = bin.join(name);
    std::fs::write(&path, format!("{SCRIPT_PROLOGUE}{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Fast-cycling config for fake daemons, logging into `<root>/logs`
pub fn fake_daemon_config(root: &Path, executable: PathBuf, port: u16) -> DaemonConfig {
    DaemonConfig {
        executable,
        port,
        log_directory: root.join("logs"),
        startup_grace_ms: 300,
        connect_attempts: 3,
        connect_interval_ms: 50,
        ..Default::default()
    }
}

/// Number of times a fake daemon was launched with this log directory
pub fn spawn_count(config: &DaemonConfig) -> usize {
    std::fs::read_to_string(config.log_directory.join("spawns"))
        .map(|text| text.lines().count())
        .unwrap_or(0)
}

/// Pid of the most recently launched fake daemon
pub fn daemon_pid(config: &DaemonConfig) -> i32 {
    std::fs::read_to_string(config.log_directory.join("pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

/// True once `pid` is gone; an unreaped zombie still counts as present
#[cfg(unix)]
pub fn process_gone(pid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), None) == Err(Errno::ESRCH)
}

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Complete auth context against `token_url`, signing with the test key
pub fn auth_context(token_url: &str) -> AuthContext {
    AuthContext {
        token_url: token_url.to_string(),
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        key_pem_path: fixture("rsa_private.pem"),
        iss: "test-client".to_string(),
        aud: token_url.to_string(),
        sub: "user@example.com".to_string(),
        org: None,
        scope: None,
    }
}

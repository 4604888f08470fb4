// Daemon configuration and the JSON document handed to the daemon

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{Error, Result};

/// Log file the transfer runtime writes next to the daemon log
pub const RUNTIME_LOG_FILE: &str = "aspera-scp-transfer.log";

const DEFAULT_EXECUTABLE: &str = "asperatransferd";

/// Verbosity of the transfer runtime, written as 0/1/2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeLogLevel {
    #[default]
    Info,
    Debug,
    Trace,
}

impl RuntimeLogLevel {
    pub fn as_int(&self) -> u8 {
        match self {
            RuntimeLogLevel::Info => 0,
            RuntimeLogLevel::Debug => 1,
            RuntimeLogLevel::Trace => 2,
        }
    }
}

/// Where the daemon finds its transfer runtime
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RuntimeMode {
    /// Runtime bundled with the daemon
    #[default]
    Embedded,
    /// Externally supplied runtime binaries and support files
    UserDefined { bin: PathBuf, etc: PathBuf },
}

/// Paths of everything the daemon reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonFiles {
    pub conf: PathBuf,
    pub out: PathBuf,
    pub err: PathBuf,
    /// The daemon's own JSON-lines log
    pub log: PathBuf,
    pub runtime_log: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Daemon executable; a bare name is looked up in PATH
    pub executable: PathBuf,
    pub address: String,
    /// 0 lets the daemon pick a port and report it in its log
    pub port: u16,
    pub log_directory: PathBuf,
    pub log_level: String,
    pub runtime_log_level: RuntimeLogLevel,
    pub runtime: RuntimeMode,
    /// Time the daemon must survive before it counts as started
    pub startup_grace_ms: u64,
    pub connect_attempts: u32,
    pub connect_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            address: "127.0.0.1".to_string(),
            port: 0,
            log_directory: std::env::temp_dir(),
            log_level: "info".to_string(),
            runtime_log_level: RuntimeLogLevel::default(),
            runtime: RuntimeMode::default(),
            startup_grace_ms: 2000,
            connect_attempts: 10,
            connect_interval_ms: 1000,
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(Error::Config("daemon.executable is empty".to_string()));
        }
        if self.address.is_empty() {
            return Err(Error::Config("daemon.address is empty".to_string()));
        }
        if self.log_level.is_empty() {
            return Err(Error::Config("daemon.log_level is empty".to_string()));
        }
        if self.connect_attempts == 0 {
            return Err(Error::Config(
                "daemon.connect_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// File name of the executable, used to name the daemon's files
    pub fn daemon_name(&self) -> String {
        self.executable
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string())
    }

    pub fn files(&self) -> DaemonFiles {
        let base = self.daemon_name();
        let file = |ext: &str| self.log_directory.join(format!("{base}.{ext}"));
        DaemonFiles {
            conf: file("conf"),
            out: file("out"),
            err: file("err"),
            log: file("log"),
            runtime_log: self.log_directory.join(RUNTIME_LOG_FILE),
        }
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn connect_interval(&self) -> Duration {
        Duration::from_millis(self.connect_interval_ms)
    }

    /// Configuration document consumed by the daemon
    pub fn document(&self) -> Value {
        let log_dir = self.log_directory.to_string_lossy();
        let mut runtime = json!({
            "use_embedded": matches!(self.runtime, RuntimeMode::Embedded),
        });
        if let RuntimeMode::UserDefined { bin, etc } = &self.runtime {
            runtime["user_defined"] = json!({
                "bin": bin.to_string_lossy(),
                "etc": etc.to_string_lossy(),
            });
        }
        runtime["log"] = json!({
            "dir": log_dir,
            "level": self.runtime_log_level.as_int(),
        });

        json!({
            "address": self.address,
            "port": self.port,
            "log_directory": log_dir,
            "log_level": self.log_level,
            "fasp_runtime": runtime,
        })
    }
}

// Daemon process utilities
//
// Writes the config document, launches the daemon with its output redirected,
// reads its JSON-lines log and stops it again.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::config::{DaemonConfig, DaemonFiles};
use crate::errors::{Error, Result};

/// How long a terminated daemon gets before it is killed
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Matches the port in messages such as `listening on 127.0.0.1:43215`
static PORT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(\d+)").expect("Failed to compile port regex"));

/// Write the daemon config document, creating the log directory if needed
pub fn write_config_file(config: &DaemonConfig, files: &DaemonFiles) -> Result<PathBuf> {
    std::fs::create_dir_all(&config.log_directory)?;
    let document = serde_json::to_string(&config.document())?;
    debug!(config = %document, "Daemon configuration");
    std::fs::write(&files.conf, document)?;
    Ok(files.conf.clone())
}

/// Launch `<executable> --config <conf>` with stdout/stderr sent to files.
///
/// The child is killed if its handle is dropped.
pub fn launch(config: &DaemonConfig, files: &DaemonFiles) -> Result<Child> {
    let stdout = File::create(&files.out)?;
    let stderr = File::create(&files.err)?;

    debug!(
        out = %files.out.display(),
        err = %files.err.display(),
        log = %files.log.display(),
        runtime_log = %files.runtime_log.display(),
        "Daemon files"
    );
    debug!(
        "command: {} --config {}",
        config.executable.display(),
        files.conf.display()
    );

    Command::new(&config.executable)
        .arg("--config")
        .arg(&files.conf)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::DaemonStartup {
            message: format!("cannot execute {}: {}", config.executable.display(), e),
        })
}

/// Fail with `DaemonStartup` if the daemon exits within `grace`
pub async fn check_alive(child: &mut Child, grace: Duration, log: &Path) -> Result<()> {
    match tokio::time::timeout(grace, child.wait()).await {
        Err(_elapsed) => Ok(()),
        Ok(Ok(status)) => {
            let detail = last_log_message(log)
                .unwrap_or_else(|| format!("check daemon log: {}", log.display()));
            warn!(status = %status, log = %log.display(), "Daemon exited during startup");
            Err(Error::DaemonStartup {
                message: format!("daemon exited ({status}): {detail}"),
            })
        }
        Ok(Err(e)) => Err(Error::Io(e)),
    }
}

/// Last non-empty line of a text file, without its line terminator
pub fn last_file_line(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim_end()
        .to_string())
}

/// `msg` field of the last log line, or the raw line when it is not JSON
pub fn last_log_message(log: &Path) -> Option<String> {
    let line = match last_file_line(log) {
        Ok(line) if !line.is_empty() => line,
        Ok(_) => return None,
        Err(e) => {
            warn!(log = %log.display(), error = %e, "Cannot read daemon log");
            return None;
        }
    };
    match serde_json::from_str::<serde_json::Value>(&line) {
        Ok(entry) => entry
            .get("msg")
            .and_then(|msg| msg.as_str())
            .map(str::to_string)
            .or(Some(line)),
        Err(_) => Some(line),
    }
}

/// Port number following the first `:` in a log message
pub fn discover_port(message: &str) -> Option<u16> {
    PORT_REGEX
        .captures(message)
        .and_then(|captures| captures.get(1))
        .and_then(|port| port.as_str().parse::<u16>().ok())
        .filter(|port| *port != 0)
}

/// Ask the daemon to stop, then kill it if it is still running after a timeout
pub async fn terminate(child: &mut Child) {
    #[cfg(target_family = "unix")]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!(pid, error = %e, "SIGTERM not delivered");
            }
            match tokio::time::timeout(TERMINATE_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(pid, status = %status, "Daemon exited");
                    return;
                }
                Ok(Err(e)) => warn!(pid, error = %e, "Error waiting for daemon to exit"),
                Err(_) => warn!(pid, "Daemon did not stop in time, killing it"),
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!(error = %e, "Daemon already gone");
    }
}

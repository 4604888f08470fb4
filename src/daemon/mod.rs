// Daemon module for the local transfer daemon
//
// Configuration document, process spawning and the supervisor that owns
// the daemon process and its RPC connection.

pub mod config;
pub mod lifecycle;
pub mod spawn;

pub use config::{DaemonConfig, DaemonFiles, RuntimeLogLevel, RuntimeMode};
pub use lifecycle::{DaemonHandle, DaemonState, DaemonSupervisor};
pub use spawn::{discover_port, last_file_line, last_log_message};

// Error taxonomy for the transfer client
//
// Every failure surfaced by the library is one `Error` variant. The binary
// turns them into user-facing messages with a remediation hint attached.

use std::fmt;
use std::path::PathBuf;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid input parameters
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load private key {path}: {reason}")]
    KeyLoad { path: PathBuf, reason: String },

    #[error("missing mandatory auth parameters: {}", .missing.join(", "))]
    AuthConfig { missing: Vec<&'static str> },

    #[error("token exchange failed with status {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("HTTP request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("daemon startup failed: {message}")]
    DaemonStartup { message: String },

    #[error("could not read listening port from daemon log")]
    PortDiscovery,

    #[error("failed to connect to daemon at {address} after {attempts} attempts")]
    ConnectionTimeout { address: String, attempts: u32 },

    #[error("transfer rejected by daemon: {description}")]
    TransferRejected { description: String },

    #[error("transfer failed: {description}")]
    TransferFailed {
        description: String,
        /// Last line of the daemon log, when it could be read
        daemon_log: Option<String>,
    },

    #[error("unknown transfer id {transfer_id}: {description}")]
    UnknownTransferId {
        transfer_id: String,
        description: String,
    },

    #[error("transfer polling cancelled")]
    Cancelled,

    #[error("transfer did not reach a terminal status within {0:?}")]
    PollDeadline(std::time::Duration),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Taxonomy name of this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::KeyLoad { .. } => "KeyLoadError",
            Error::AuthConfig { .. } => "AuthConfigError",
            Error::TokenExchange { .. } => "TokenExchangeError",
            Error::HttpStatus { .. } => "HttpStatusError",
            Error::DaemonStartup { .. } => "DaemonStartupError",
            Error::PortDiscovery => "PortDiscoveryError",
            Error::ConnectionTimeout { .. } => "ConnectionTimeoutError",
            Error::TransferRejected { .. } => "TransferRejectedError",
            Error::TransferFailed { .. } => "TransferFailedError",
            Error::UnknownTransferId { .. } => "UnknownTransferIdError",
            Error::Cancelled => "Cancelled",
            Error::PollDeadline(_) => "PollDeadlineError",
            Error::Http(_) => "HttpTransportError",
            Error::Rpc(_) => "RpcError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
        }
    }

    /// Fatal for the current transfer only; the daemon stays usable
    pub fn is_transfer_failure(&self) -> bool {
        matches!(
            self,
            Error::TransferRejected { .. }
                | Error::TransferFailed { .. }
                | Error::UnknownTransferId { .. }
        )
    }

    /// Fatal for the current run; the daemon was torn down before returning
    pub fn is_daemon_failure(&self) -> bool {
        matches!(
            self,
            Error::DaemonStartup { .. } | Error::PortDiscovery | Error::ConnectionTimeout { .. }
        )
    }

    /// Remediation hint shown to the user, if one applies
    pub fn suggestion(&self) -> Option<&'static str> {
        let hint = match self {
            Error::Config(_) => "Check the [daemon], [auth] and [api] tables of the config file",
            Error::KeyLoad { .. } => {
                "Verify that auth.key_pem_path points to a readable PEM-encoded RSA private key"
            }
            Error::AuthConfig { .. } => {
                "Set token_url, aud, client_id, client_secret, key_pem_path, iss and sub in [auth]"
            }
            Error::TokenExchange { .. } => {
                "Check client id/secret and that the public key is registered with the identity provider"
            }
            Error::DaemonStartup { .. } => {
                "Check the daemon log in the log directory and daemon.executable in the config file"
            }
            Error::PortDiscovery => "Set daemon.port to a fixed value instead of 0",
            Error::ConnectionTimeout { .. } => {
                "Make sure the daemon address and port are not blocked or already in use"
            }
            Error::TransferFailed { .. } => "Look at the transfer log in the log directory",
            _ => return None,
        };
        Some(hint)
    }
}

/// Wrap an error with a suggestion
pub fn wrap_error_with_suggestion(error: impl fmt::Display, suggestion: &str) -> String {
    format!(
        "{}\n\n\
        \x1b[1;33mSuggestion:\x1b[0m {}",
        error, suggestion
    )
}

/// Format a library error for display, attaching its hint when it has one
pub fn user_message(error: &Error) -> String {
    let mut message = error.to_string();
    if let Error::TransferFailed {
        daemon_log: Some(line),
        ..
    } = error
    {
        message.push_str(&format!("\nDaemon log: {line}"));
    }
    match error.suggestion() {
        Some(hint) => wrap_error_with_suggestion(message, hint),
        None => message,
    }
}

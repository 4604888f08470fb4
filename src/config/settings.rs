// Configuration structs

use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::daemon::DaemonConfig;

/// Contents of the settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub daemon: DaemonConfig,
    /// Token endpoint and signing key for REST APIs
    pub auth: Option<AuthContext>,
    pub api: Option<ApiConfig>,
}

/// Product REST API reached with bearer tokens from `[auth]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

fn default_verify_tls() -> bool {
    true
}

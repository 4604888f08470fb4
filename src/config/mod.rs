// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{default_config_path, load_settings, parse_settings, resolve_config_path, CONFIG_ENV_VAR};
pub use settings::{ApiConfig, Settings};

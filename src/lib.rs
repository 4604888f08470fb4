// transferd-client - Transfer orchestration client
// Library exports

pub mod auth; // JWT-bearer OAuth2 token issuance
pub mod client; // REST client for product APIs and token endpoints
pub mod config;
pub mod daemon; // Daemon process supervision
pub mod errors;
pub mod rpc; // gRPC control plane to the daemon
pub mod transfer; // Transfer submission, polling and orchestration

pub use errors::{Error, Result};

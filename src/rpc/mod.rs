// Control-plane RPC to the transfer daemon
//
// `TransferService` is the seam between the polling logic and the wire.
// `GrpcConnector` produces the real implementation; tests plug in doubles.

mod grpc;
pub mod proto;

use async_trait::async_trait;

use crate::errors::Result;
use crate::transfer::TransferStatus;

pub use grpc::{GrpcConnector, GrpcTransferService};

/// Log verbosity sent with every start request
pub const TRANSFER_LOG_LEVEL: i32 = 2;

/// Start request as the daemon receives it
#[derive(Debug, Clone, PartialEq)]
pub struct StartTransferRequest {
    pub log_level: i32,
    /// Transfer spec serialized as JSON
    pub transfer_spec: String,
}

/// Error payload reported by the daemon
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonError {
    pub code: i32,
    pub description: String,
}

/// Answer to a start or query call
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReply {
    pub transfer_id: String,
    pub status: TransferStatus,
    pub error: Option<DaemonError>,
}

impl TransferReply {
    /// Daemon-supplied description, empty when the reply carries no error
    pub fn description(&self) -> String {
        self.error
            .as_ref()
            .map(|e| e.description.clone())
            .unwrap_or_default()
    }
}

/// Operations the daemon exposes for one transfer
#[async_trait]
pub trait TransferService: Send {
    async fn start_transfer(&mut self, request: StartTransferRequest) -> Result<TransferReply>;

    async fn query_transfer(&mut self, transfer_id: &str) -> Result<TransferReply>;
}

/// Opens a `TransferService` to a daemon listening on `address:port`
#[async_trait]
pub trait Connector: Send + Sync {
    /// One connection attempt; the caller owns the retry policy
    async fn connect(&self, address: &str, port: u16) -> Result<Box<dyn TransferService>>;
}

// gRPC implementation of TransferService over a plaintext tonic channel

use async_trait::async_trait;
use std::time::Duration;
use tonic::transport::Endpoint;
use tracing::debug;

use super::proto;
use super::{Connector, DaemonError, StartTransferRequest, TransferReply, TransferService};
use crate::errors::{Error, Result};
use crate::transfer::TransferStatus;

impl From<proto::TransferStatus> for TransferStatus {
    fn from(status: proto::TransferStatus) -> Self {
        match status {
            proto::TransferStatus::UnknownStatus => TransferStatus::Unknown,
            proto::TransferStatus::Queued => TransferStatus::Queued,
            proto::TransferStatus::Running => TransferStatus::Running,
            proto::TransferStatus::Completed => TransferStatus::Completed,
            proto::TransferStatus::Failed => TransferStatus::Failed,
            proto::TransferStatus::Canceled => TransferStatus::Canceled,
            proto::TransferStatus::Paused => TransferStatus::Paused,
            proto::TransferStatus::Orphaned => TransferStatus::Orphaned,
        }
    }
}

/// Decode a wire status; values this client does not know map to `Unknown`
pub(crate) fn status_from_wire(value: i32) -> TransferStatus {
    proto::TransferStatus::try_from(value)
        .map(TransferStatus::from)
        .unwrap_or(TransferStatus::Unknown)
}

fn reply(transfer_id: String, status: i32, error: Option<proto::Error>) -> TransferReply {
    TransferReply {
        transfer_id,
        status: status_from_wire(status),
        error: error.map(|e| DaemonError {
            code: e.code,
            description: e.description,
        }),
    }
}

/// Daemon stub bound to one channel
pub struct GrpcTransferService {
    client: proto::TransferServiceClient,
}

impl GrpcTransferService {
    pub fn new(client: proto::TransferServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransferService for GrpcTransferService {
    async fn start_transfer(&mut self, request: StartTransferRequest) -> Result<TransferReply> {
        let wire = proto::TransferRequest {
            transfer_type: proto::TransferType::FileRegular as i32,
            config: Some(proto::TransferConfig {
                log_level: request.log_level,
                ..Default::default()
            }),
            transfer_spec: request.transfer_spec,
        };
        let response = self.client.start_transfer(wire).await?;
        Ok(reply(response.transfer_id, response.status, response.error))
    }

    async fn query_transfer(&mut self, transfer_id: &str) -> Result<TransferReply> {
        let response = self
            .client
            .query_transfer(proto::TransferInfoRequest {
                transfer_id: transfer_id.to_string(),
            })
            .await?;
        let id = if response.transfer_id.is_empty() {
            transfer_id.to_string()
        } else {
            response.transfer_id
        };
        Ok(reply(id, response.status, response.error))
    }
}

/// Connects over plaintext HTTP/2, one attempt per call.
///
/// An attempt succeeds only once the daemon answers `GetInfo`, so a listener
/// that accepts TCP but does not speak the protocol counts as unreachable.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    attempt_timeout: Duration,
}

impl GrpcConnector {
    /// `attempt_timeout` bounds the connect and the `GetInfo` round trip together
    pub fn new(attempt_timeout: Duration) -> Self {
        Self { attempt_timeout }
    }

    async fn handshake(&self, uri: &str) -> Result<proto::TransferServiceClient> {
        let endpoint = Endpoint::from_shared(uri.to_string())
            .map_err(|e| Error::Config(format!("invalid daemon address {uri}: {e}")))?
            .connect_timeout(self.attempt_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::Rpc(tonic::Status::unavailable(e.to_string())))?;

        let mut client = proto::TransferServiceClient::new(channel);
        client.get_info(proto::InstanceInfoRequest {}).await?;
        Ok(client)
    }
}

impl Default for GrpcConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    async fn connect(&self, address: &str, port: u16) -> Result<Box<dyn TransferService>> {
        let uri = format!("http://{address}:{port}");
        let client = tokio::time::timeout(self.attempt_timeout, self.handshake(&uri))
            .await
            .map_err(|_| {
                Error::Rpc(tonic::Status::deadline_exceeded(format!(
                    "no GetInfo reply from {uri} within {:?}",
                    self.attempt_timeout
                )))
            })??;
        debug!(uri = %uri, "Daemon answered GetInfo");

        Ok(Box::new(GrpcTransferService::new(client)))
    }
}

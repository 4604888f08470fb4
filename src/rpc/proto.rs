// Wire messages of the `transferd.api.TransferService` gRPC contract
//
// Only the messages used for info/start/query are declared, written by hand
// instead of generated from the daemon's .proto. Tags were taken from the
// field order the daemon's clients use. `TransferConfig.log_level` (tag 2) is
// the one tag no client here could confirm; check it against the daemon's
// transferd.proto before relying on per-transfer log levels. Unknown fields
// in replies are skipped by prost.

use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

const GET_INFO_PATH: &str = "/transferd.api.TransferService/GetInfo";
const START_TRANSFER_PATH: &str = "/transferd.api.TransferService/StartTransfer";
const QUERY_TRANSFER_PATH: &str = "/transferd.api.TransferService/QueryTransfer";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TransferType {
    FileRegular = 0,
    StreamToFileUpload = 1,
    FileToStreamDownload = 2,
    StreamToStream = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TransferStatus {
    UnknownStatus = 0,
    Queued = 1,
    Running = 2,
    Completed = 3,
    Failed = 4,
    Canceled = 5,
    Paused = 6,
    Orphaned = 7,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstanceInfoRequest {}

/// Daemon instance details; only a successful decode matters to the client
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstanceInfoResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferConfig {
    #[prost(string, tag = "1")]
    pub connection_type: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub log_level: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferRequest {
    #[prost(enumeration = "TransferType", tag = "1")]
    pub transfer_type: i32,
    #[prost(message, optional, tag = "2")]
    pub config: ::core::option::Option<TransferConfig>,
    #[prost(string, tag = "3")]
    pub transfer_spec: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Error {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub description: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartTransferResponse {
    #[prost(string, tag = "1")]
    pub transfer_id: ::prost::alloc::string::String,
    #[prost(enumeration = "TransferStatus", tag = "2")]
    pub status: i32,
    #[prost(message, optional, tag = "3")]
    pub error: ::core::option::Option<Error>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferInfoRequest {
    #[prost(string, tag = "1")]
    pub transfer_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryTransferResponse {
    #[prost(string, tag = "1")]
    pub transfer_id: ::prost::alloc::string::String,
    #[prost(enumeration = "TransferStatus", tag = "2")]
    pub status: i32,
    #[prost(message, optional, tag = "3")]
    pub error: ::core::option::Option<Error>,
}

/// Unary client for the calls the supervisor and orchestrator need
#[derive(Debug, Clone)]
pub struct TransferServiceClient {
    inner: tonic::client::Grpc<Channel>,
}

impl TransferServiceClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    async fn unary<Req, Resp>(
        &mut self,
        request: Req,
        path: &'static str,
    ) -> Result<Resp, tonic::Status>
    where
        Req: ::prost::Message + Send + Sync + 'static,
        Resp: ::prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {e}")))?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = self
            .inner
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(response.into_inner())
    }

    pub async fn get_info(
        &mut self,
        request: InstanceInfoRequest,
    ) -> Result<InstanceInfoResponse, tonic::Status> {
        self.unary(request, GET_INFO_PATH).await
    }

    pub async fn start_transfer(
        &mut self,
        request: TransferRequest,
    ) -> Result<StartTransferResponse, tonic::Status> {
        self.unary(request, START_TRANSFER_PATH).await
    }

    pub async fn query_transfer(
        &mut self,
        request: TransferInfoRequest,
    ) -> Result<QueryTransferResponse, tonic::Status> {
        self.unary(request, QUERY_TRANSFER_PATH).await
    }
}

// Transfer submission, polling and orchestration

mod client;
mod orchestrator;
mod spec;
mod status;

pub use client::{PollOptions, TransferRpcClient};
pub use orchestrator::TransferOrchestrator;
pub use spec::{TransferId, TransferSpec};
pub use status::TransferStatus;

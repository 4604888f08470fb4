use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer state as reported by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Unknown,
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
    Paused,
    Orphaned,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Unknown => "UNKNOWN",
            TransferStatus::Queued => "QUEUED",
            TransferStatus::Running => "RUNNING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
            TransferStatus::Canceled => "CANCELED",
            TransferStatus::Paused => "PAUSED",
            TransferStatus::Orphaned => "ORPHANED",
        }
    }

    /// Polling stops on these. CANCELED, PAUSED and ORPHANED keep it going.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Unknown
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

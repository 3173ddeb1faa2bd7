use std::path::PathBuf;

use af_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ledger io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize ledger payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("content hash mismatch at seq {seq} (stored {stored}, computed {computed})")]
    HashMismatch {
        seq: u64,
        stored: String,
        computed: String,
    },
    #[error("ledger inconsistent at position {position}: {detail}")]
    Inconsistent { position: u64, detail: String },
    #[error("ledger moved on: expected head seq {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },
}

impl LedgerError {
    /// Stable code for this failure. Storage-level failures are reported
    /// as `LEDGER_INCONSISTENT`: the ledger can no longer be trusted until
    /// it is verified again. A conflicting append is a concurrent
    /// modification and safe to retry.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::HashMismatch { .. } => ErrorCode::ContentHashMismatch,
            Self::Conflict { .. } => ErrorCode::ValidationInvariantFailed,
            Self::Sqlite(_) | Self::Io { .. } | Self::Serialize(_) | Self::Inconsistent { .. } => {
                ErrorCode::LedgerInconsistent
            }
        }
    }

    /// True for integrity failures found by verification.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::HashMismatch { .. } | Self::Inconsistent { .. })
    }
}

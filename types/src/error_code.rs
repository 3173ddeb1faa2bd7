//! Stable error codes and the exit-code contract shared by all front-ends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient contention; retrying the same request may succeed.
    Retriable,
    /// Gated by open challenges or unfinished children.
    Blocked,
    /// Caller mistake; the request must change before retrying.
    Logic,
    /// Ledger integrity failure; needs an explicit verify/replay recovery.
    Corruption,
}

impl ErrorClass {
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Retriable => 1,
            Self::Blocked => 2,
            Self::Logic => 3,
            Self::Corruption => 4,
        }
    }

    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Retriable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AlreadyClaimed,
    NotClaimHolder,
    ValidationInvariantFailed,
    NodeBlocked,
    InvalidParent,
    InvalidType,
    InvalidInference,
    InvalidTarget,
    ChallengeNotFound,
    DefNotFound,
    AssumptionNotFound,
    ExternalNotFound,
    ScopeViolation,
    ScopeUnclosed,
    DependencyCycle,
    DepthExceeded,
    ChallengeLimitExceeded,
    RefinementLimitExceeded,
    ExtractionInvalid,
    ContentHashMismatch,
    LedgerInconsistent,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyClaimed => "ALREADY_CLAIMED",
            Self::NotClaimHolder => "NOT_CLAIM_HOLDER",
            Self::ValidationInvariantFailed => "VALIDATION_INVARIANT_FAILED",
            Self::NodeBlocked => "NODE_BLOCKED",
            Self::InvalidParent => "INVALID_PARENT",
            Self::InvalidType => "INVALID_TYPE",
            Self::InvalidInference => "INVALID_INFERENCE",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            Self::DefNotFound => "DEF_NOT_FOUND",
            Self::AssumptionNotFound => "ASSUMPTION_NOT_FOUND",
            Self::ExternalNotFound => "EXTERNAL_NOT_FOUND",
            Self::ScopeViolation => "SCOPE_VIOLATION",
            Self::ScopeUnclosed => "SCOPE_UNCLOSED",
            Self::DependencyCycle => "DEPENDENCY_CYCLE",
            Self::DepthExceeded => "DEPTH_EXCEEDED",
            Self::ChallengeLimitExceeded => "CHALLENGE_LIMIT_EXCEEDED",
            Self::RefinementLimitExceeded => "REFINEMENT_LIMIT_EXCEEDED",
            Self::ExtractionInvalid => "EXTRACTION_INVALID",
            Self::ContentHashMismatch => "CONTENT_HASH_MISMATCH",
            Self::LedgerInconsistent => "LEDGER_INCONSISTENT",
        }
    }

    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::AlreadyClaimed | Self::NotClaimHolder | Self::ValidationInvariantFailed => {
                ErrorClass::Retriable
            }
            Self::NodeBlocked => ErrorClass::Blocked,
            Self::ContentHashMismatch | Self::LedgerInconsistent => ErrorClass::Corruption,
            Self::InvalidParent
            | Self::InvalidType
            | Self::InvalidInference
            | Self::InvalidTarget
            | Self::ChallengeNotFound
            | Self::DefNotFound
            | Self::AssumptionNotFound
            | Self::ExternalNotFound
            | Self::ScopeViolation
            | Self::ScopeUnclosed
            | Self::DependencyCycle
            | Self::DepthExceeded
            | Self::ChallengeLimitExceeded
            | Self::RefinementLimitExceeded
            | Self::ExtractionInvalid => ErrorClass::Logic,
        }
    }

    #[must_use]
    pub const fn exit_code(self) -> u8 {
        self.class().exit_code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

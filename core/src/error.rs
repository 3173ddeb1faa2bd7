//! Engine failures mapped onto the stable error-code contract.

use af_ledger::LedgerError;
use af_types::{EnumKind, EnumParseError, ErrorClass, ErrorCode, NodeIdError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A mutation refused before anything was written.
    #[error("{code}: {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Rejected { code, .. } => *code,
            Self::Ledger(err) => err.code(),
        }
    }

    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.code().class()
    }

    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.code().exit_code()
    }

    #[must_use]
    pub fn is_retriable(&self) -> bool {
        self.class().is_retriable()
    }
}

/// Front-ends parse raw vocabulary text; each vocabulary maps to the code a
/// bad value of that kind is reported under.
impl From<EnumParseError> for Error {
    fn from(err: EnumParseError) -> Self {
        let code = match err.kind() {
            EnumKind::InferenceType => ErrorCode::InvalidInference,
            EnumKind::ChallengeTarget | EnumKind::ChallengeSeverity => ErrorCode::InvalidTarget,
            _ => ErrorCode::InvalidType,
        };
        Self::rejected(code, err.to_string())
    }
}

impl From<NodeIdError> for Error {
    fn from(err: NodeIdError) -> Self {
        Self::rejected(ErrorCode::InvalidTarget, err.to_string())
    }
}

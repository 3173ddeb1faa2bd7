//! Core domain types for the Assumption Framework engine.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies: node identifiers, the enumerated vocabularies, nodes,
//! challenges, ledger events and the stable error-code contract.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod challenge;
pub mod digest;
mod error_code;
mod event;
mod node;
mod node_id;
mod vocabulary;

pub use challenge::{Challenge, ChallengeId, IdParseError, Lemma, LemmaId};
pub use error_code::{ErrorClass, ErrorCode};
pub use event::Event;
pub use node::{ClaimHold, Node};
pub use node_id::{NodeId, NodeIdError};
pub use vocabulary::{
    ChallengeSeverity, ChallengeStatus, ChallengeTarget, EnumKind, EnumParseError,
    EpistemicState, InferenceType, NodeType, PremiseRequirement, Role, TaintState,
    WorkflowState,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
///
/// Used where the protocol requires text, such as challenge resolutions.
/// Deserialization re-validates, so a ledger payload cannot smuggle in an
/// empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("text must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_string_rejects_whitespace() {
        assert!(NonEmptyString::new("   ").is_err());
        assert!(NonEmptyString::new("").is_err());
        assert_eq!(NonEmptyString::new(" ok ").unwrap().as_str(), " ok ");
    }

    #[test]
    fn non_empty_string_deserialize_validates() {
        assert!(serde_json::from_str::<NonEmptyString>("\"\"").is_err());
        let value: NonEmptyString = serde_json::from_str("\"fixed\"").unwrap();
        assert_eq!(&*value, "fixed");
    }
}

//! Enumerated vocabularies validated by the engine.
//!
//! Every enum renders and parses in snake_case, matching the wire form used
//! in ledger payloads and by front-ends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    Role,
    NodeType,
    InferenceType,
    WorkflowState,
    EpistemicState,
    TaintState,
    ChallengeTarget,
    ChallengeSeverity,
    ChallengeStatus,
}

impl EnumKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EnumKind::Role => "role",
            EnumKind::NodeType => "node type",
            EnumKind::InferenceType => "inference type",
            EnumKind::WorkflowState => "workflow state",
            EnumKind::EpistemicState => "epistemic state",
            EnumKind::TaintState => "taint state",
            EnumKind::ChallengeTarget => "challenge target",
            EnumKind::ChallengeSeverity => "challenge severity",
            EnumKind::ChallengeStatus => "challenge status",
        }
    }
}

impl fmt::Display for EnumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value '{raw}'; expected one of: {expected:?}")]
pub struct EnumParseError {
    kind: EnumKind,
    raw: String,
    expected: &'static [&'static str],
}

impl EnumParseError {
    #[must_use]
    pub fn new(kind: EnumKind, raw: impl Into<String>, expected: &'static [&'static str]) -> Self {
        Self {
            kind,
            raw: raw.into(),
            expected,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> EnumKind {
        self.kind
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub const fn expected(&self) -> &'static [&'static str] {
        self.expected
    }
}

/// Declares a closed snake_case vocabulary with `ALL`, `as_str`, `parse`,
/// `Display` and `FromStr`.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:expr) {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];
            const NAMES: &'static [&'static str] = &[$($text),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(raw: &str) -> Result<Self, EnumParseError> {
                match raw.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(EnumParseError::new($kind, other, Self::NAMES)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

vocabulary! {
    /// Advisory role attached to a claim; used for job selection only.
    Role (EnumKind::Role) {
        Prover => "prover",
        Verifier => "verifier",
    }
}

vocabulary! {
    NodeType (EnumKind::NodeType) {
        Claim => "claim",
        Case => "case",
        Qed => "qed",
        LocalAssume => "local_assume",
        LocalDischarge => "local_discharge",
    }
}

vocabulary! {
    InferenceType (EnumKind::InferenceType) {
        ModusPonens => "modus_ponens",
        ModusTollens => "modus_tollens",
        ByDefinition => "by_definition",
        Assumption => "assumption",
        LocalAssume => "local_assume",
        LocalDischarge => "local_discharge",
        Contradiction => "contradiction",
        UniversalInstantiation => "universal_instantiation",
        ExistentialInstantiation => "existential_instantiation",
        UniversalGeneralization => "universal_generalization",
        ExistentialGeneralization => "existential_generalization",
    }
}

vocabulary! {
    WorkflowState (EnumKind::WorkflowState) {
        Available => "available",
        Claimed => "claimed",
        Blocked => "blocked",
    }
}

vocabulary! {
    EpistemicState (EnumKind::EpistemicState) {
        Pending => "pending",
        Validated => "validated",
        Admitted => "admitted",
        Refuted => "refuted",
        Archived => "archived",
        NeedsRefinement => "needs_refinement",
    }
}

vocabulary! {
    TaintState (EnumKind::TaintState) {
        Clean => "clean",
        SelfAdmitted => "self_admitted",
        Tainted => "tainted",
        Unresolved => "unresolved",
    }
}

vocabulary! {
    /// The aspect of a node a challenge objects to.
    ChallengeTarget (EnumKind::ChallengeTarget) {
        Statement => "statement",
        Inference => "inference",
        Context => "context",
        Dependencies => "dependencies",
        Scope => "scope",
        Gap => "gap",
        TypeError => "type_error",
        Domain => "domain",
        Completeness => "completeness",
    }
}

vocabulary! {
    ChallengeSeverity (EnumKind::ChallengeSeverity) {
        Critical => "critical",
        Major => "major",
        Minor => "minor",
        Note => "note",
    }
}

vocabulary! {
    ChallengeStatus (EnumKind::ChallengeStatus) {
        Open => "open",
        Resolved => "resolved",
        Withdrawn => "withdrawn",
    }
}

impl NodeType {
    /// Whether nodes of this type may be refined further.
    #[must_use]
    pub const fn accepts_children(self) -> bool {
        !matches!(self, Self::Qed | Self::LocalDischarge)
    }
}

/// What an inference rule demands of its premises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiseRequirement {
    pub min_dependencies: usize,
    pub min_definitions: usize,
}

impl InferenceType {
    #[must_use]
    pub const fn premises(self) -> PremiseRequirement {
        let (min_dependencies, min_definitions) = match self {
            Self::ModusPonens | Self::ModusTollens => (2, 0),
            Self::Contradiction
            | Self::UniversalInstantiation
            | Self::ExistentialInstantiation
            | Self::UniversalGeneralization
            | Self::ExistentialGeneralization => (1, 0),
            Self::ByDefinition => (0, 1),
            Self::Assumption | Self::LocalAssume | Self::LocalDischarge => (0, 0),
        };
        PremiseRequirement {
            min_dependencies,
            min_definitions,
        }
    }

    /// The node type this rule is bound to, if any. `local_assume` and
    /// `local_discharge` rules only make sense on nodes of the same name.
    #[must_use]
    pub const fn bound_node_type(self) -> Option<NodeType> {
        match self {
            Self::LocalAssume => Some(NodeType::LocalAssume),
            Self::LocalDischarge => Some(NodeType::LocalDischarge),
            _ => None,
        }
    }
}

impl EpistemicState {
    /// Validated or admitted: the node counts as accepted for parents and
    /// dependents.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Validated | Self::Admitted)
    }

    /// Whether the state machine permits `self -> next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Validated | Self::Admitted | Self::Refuted | Self::Archived
            ) | (
                Self::Validated | Self::Admitted | Self::Refuted,
                Self::Archived | Self::NeedsRefinement
            ) | (Self::NeedsRefinement, Self::Pending | Self::Archived)
        )
    }
}

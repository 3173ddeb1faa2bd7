//! Challenges raised by verifiers and lemmas extracted from validated nodes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChallengeSeverity, ChallengeStatus, ChallengeTarget, NodeId, NonEmptyString};

/// Challenge identifier, rendered `ch-<n>` and assigned in ledger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChallengeId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} id '{raw}'")]
pub struct IdParseError {
    kind: &'static str,
    raw: String,
}

impl ChallengeId {
    const PREFIX: &'static str = "ch-";

    #[must_use]
    pub const fn new(ordinal: u64) -> Self {
        Self(ordinal)
    }

    #[must_use]
    pub const fn ordinal(self) -> u64 {
        self.0
    }

    pub fn parse(raw: &str) -> Result<Self, IdParseError> {
        parse_prefixed(raw, Self::PREFIX, "challenge").map(Self)
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

fn parse_prefixed(raw: &str, prefix: &str, kind: &'static str) -> Result<u64, IdParseError> {
    raw.strip_prefix(prefix)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| IdParseError {
            kind,
            raw: raw.to_owned(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub node_id: NodeId,
    pub target: ChallengeTarget,
    pub reason: String,
    pub severity: ChallengeSeverity,
    /// Whether the severity blocked acceptance under the config in force
    /// when the challenge was raised. Fixed at raise time.
    pub blocking: bool,
    pub status: ChallengeStatus,
    #[serde(default)]
    pub resolution: Option<NonEmptyString>,
    pub raised_by: String,
    pub raised_at: DateTime<Utc>,
}

impl Challenge {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ChallengeStatus::Open
    }

    /// Open and blocking.
    #[must_use]
    pub fn blocks(&self) -> bool {
        self.blocking && self.is_open()
    }
}

/// Lemma identifier, rendered `L-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LemmaId(u64);

impl LemmaId {
    const PREFIX: &'static str = "L-";

    #[must_use]
    pub const fn new(ordinal: u64) -> Self {
        Self(ordinal)
    }

    #[must_use]
    pub const fn ordinal(self) -> u64 {
        self.0
    }

    pub fn parse(raw: &str) -> Result<Self, IdParseError> {
        parse_prefixed(raw, Self::PREFIX, "lemma").map(Self)
    }
}

impl fmt::Display for LemmaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

macro_rules! string_serde {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(D::Error::custom)
            }
        }
    };
}

string_serde!(ChallengeId);
string_serde!(LemmaId);

/// A validated node's statement lifted out for reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lemma {
    pub id: LemmaId,
    pub source: NodeId,
    pub statement: String,
    /// Content hash of the source node at extraction time.
    pub source_hash: String,
    pub extracted_by: String,
}

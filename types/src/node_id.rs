//! Hierarchical node identifiers.
//!
//! A `NodeId` is an immutable sequence of positive integers. The root is `1`,
//! its children `1.1`, `1.2`, and so on. Ordering compares segments
//! numerically, so `1.2 < 1.10` and a parent always sorts before its children.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Box<[u32]>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("node id must not be empty")]
    Empty,
    #[error("node id '{raw}' has an empty segment")]
    EmptySegment { raw: String },
    #[error("node id '{raw}' has a non-numeric segment '{segment}'")]
    NotNumeric { raw: String, segment: String },
    #[error("node id '{raw}' has a zero segment")]
    ZeroSegment { raw: String },
}

impl NodeId {
    /// The proof root, `1`.
    #[must_use]
    pub fn root() -> Self {
        Self(Box::new([1]))
    }

    pub fn from_segments(segments: &[u32]) -> Result<Self, NodeIdError> {
        if segments.is_empty() {
            return Err(NodeIdError::Empty);
        }
        if segments.contains(&0) {
            return Err(NodeIdError::ZeroSegment {
                raw: render(segments),
            });
        }
        Ok(Self(segments.into()))
    }

    pub fn parse(raw: &str) -> Result<Self, NodeIdError> {
        if raw.is_empty() {
            return Err(NodeIdError::Empty);
        }
        let mut segments = Vec::new();
        for segment in raw.split('.') {
            if segment.is_empty() {
                return Err(NodeIdError::EmptySegment {
                    raw: raw.to_owned(),
                });
            }
            // u32::from_str accepts a leading '+', which is not part of the id grammar.
            if !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(NodeIdError::NotNumeric {
                    raw: raw.to_owned(),
                    segment: segment.to_owned(),
                });
            }
            let value: u32 = segment.parse().map_err(|_err| NodeIdError::NotNumeric {
                raw: raw.to_owned(),
                segment: segment.to_owned(),
            })?;
            if value == 0 {
                return Err(NodeIdError::ZeroSegment {
                    raw: raw.to_owned(),
                });
            }
            segments.push(value);
        }
        Ok(Self(segments.into_boxed_slice()))
    }

    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Number of segments; the root has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].into()))
        }
    }

    /// The `index`-th child (1-based). Zero is rejected.
    pub fn child(&self, index: u32) -> Result<Self, NodeIdError> {
        let mut segments = self.0.to_vec();
        segments.push(index);
        Self::from_segments(&segments)
    }

    /// The last segment, i.e. this node's position among its siblings.
    #[must_use]
    pub fn last_segment(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        self.0.len() + 1 == other.0.len() && other.0.starts_with(&self.0)
    }
}

fn render(segments: &[u32]) -> String {
    segments
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.0))
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

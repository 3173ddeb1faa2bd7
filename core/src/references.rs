//! Resolution of names cited by nodes: definitions, named global
//! assumptions and external references.
//!
//! The engine only asks whether a name exists. Where the names live (a
//! definitions file, a library index, a fixed list) is up to the caller.

use std::collections::BTreeSet;

pub trait ReferenceResolver: Send + Sync {
    fn has_definition(&self, name: &str) -> bool;
    fn has_assumption(&self, name: &str) -> bool;
    fn has_external(&self, name: &str) -> bool;
}

/// A fixed set of known names. The default resolves nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticReferences {
    definitions: BTreeSet<String>,
    assumptions: BTreeSet<String>,
    externals: BTreeSet<String>,
}

impl StaticReferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_definition(mut self, name: impl Into<String>) -> Self {
        self.definitions.insert(name.into());
        self
    }

    #[must_use]
    pub fn with_assumption(mut self, name: impl Into<String>) -> Self {
        self.assumptions.insert(name.into());
        self
    }

    #[must_use]
    pub fn with_external(mut self, name: impl Into<String>) -> Self {
        self.externals.insert(name.into());
        self
    }
}

impl ReferenceResolver for StaticReferences {
    fn has_definition(&self, name: &str) -> bool {
        self.definitions.contains(name)
    }

    fn has_assumption(&self, name: &str) -> bool {
        self.assumptions.contains(name)
    }

    fn has_external(&self, name: &str) -> bool {
        self.externals.contains(name)
    }
}

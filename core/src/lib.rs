//! Proof engine for the Assumption Framework.
//!
//! An [`Engine`] owns one proof ledger. Every state change goes through it:
//! the change is validated against the current [`ProofState`], checked
//! against the caller's claim, appended to the ledger together with the
//! taint updates it causes, and only then published to readers.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use af_config::EngineConfig;
//! use af_core::{Engine, NodeDraft, StaticReferences};
//! use af_types::{InferenceType, NodeType, Role};
//!
//! # fn main() -> af_core::Result<()> {
//! let engine = Engine::open(
//!     "proof/ledger.db",
//!     EngineConfig::default(),
//!     Arc::new(StaticReferences::default()),
//! )?;
//! let root = engine.init("alice", "there are infinitely many primes")?;
//! engine.claim(&root, "alice", Role::Prover, None)?;
//! engine.refine(
//!     &root,
//!     "alice",
//!     &[NodeDraft::new(
//!         NodeType::Claim,
//!         "assume finitely many primes",
//!         InferenceType::Assumption,
//!     )],
//! )?;
//! # Ok(())
//! # }
//! ```

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Error codes are documented on ErrorCode
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions
#![allow(clippy::module_name_repetitions)]

mod challenges;
mod claims;
mod clock;
mod engine;
mod error;
mod graph;
mod history;
mod jobs;
mod references;
mod state;
pub mod taint;
mod validation;

pub use challenges::{ChallengeEngine, Objection};
pub use claims::ClaimManager;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Engine, REAPER_ACTOR, Snapshot};
pub use error::{Error, Result};
pub use graph::{find_cycle, topological_order, with_dependents};
pub use history::History;
pub use jobs::{Job, JobReason, JobSelector};
pub use references::{ReferenceResolver, StaticReferences};
pub use state::{ApplyError, ProofState};
pub use validation::{NodeDraft, ValidationEngine};

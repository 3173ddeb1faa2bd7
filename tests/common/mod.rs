//! Shared test utilities and fixtures
//!
//! Every fixture opens a real on-disk ledger in a temporary directory and
//! drives time through a [`ManualClock`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use af_config::EngineConfig;
use af_core::{Engine, ManualClock, NodeDraft, StaticReferences};
use af_types::{InferenceType, NodeId, NodeType, Role};
use chrono::{DateTime, Utc};
use tempfile::TempDir;

pub const CONJECTURE: &str = "every integer n > 1 has a prime factor";

/// A ledger file that lives as long as the fixture.
pub struct Workspace {
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            clock: Arc::new(ManualClock::new(start())),
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("proof.db")
    }

    pub fn open(&self) -> Engine {
        self.open_with(EngineConfig::default())
    }

    pub fn open_with(&self, config: EngineConfig) -> Engine {
        open_at(&self.ledger_path(), config, self.clock.clone())
    }
}

pub fn open_at(path: &Path, config: EngineConfig, clock: Arc<ManualClock>) -> Engine {
    Engine::open(path, config, Arc::new(StaticReferences::default()))
        .unwrap()
        .with_clock(clock)
}

pub fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn id(raw: &str) -> NodeId {
    NodeId::parse(raw).unwrap()
}

pub fn claim(statement: &str) -> NodeDraft {
    NodeDraft::new(NodeType::Claim, statement, InferenceType::Assumption)
}

/// Root plus `1.1` and `1.2`, all unclaimed.
pub fn seed(engine: &Engine) {
    engine.init("prover", CONJECTURE).unwrap();
    engine
        .claim(&NodeId::root(), "prover", Role::Prover, None)
        .unwrap();
    engine
        .refine(
            &NodeId::root(),
            "prover",
            &[claim("n is prime"), claim("n is composite")],
        )
        .unwrap();
    engine.release(&NodeId::root(), "prover").unwrap();
}

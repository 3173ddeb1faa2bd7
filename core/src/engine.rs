//! The engine handle.
//!
//! Writes serialize through one mutex that owns the ledger connection.
//! Each write validates against a private copy of the current state,
//! applies its events to that copy, settles taint, appends every event in
//! one ledger transaction and only then publishes the copy as the new
//! snapshot. A failure at any step discards the copy; readers never see a
//! partial mutation.
//!
//! Reads clone an `Arc<Snapshot>` under a briefly held read lock and never
//! wait for a write transaction.
//!
//! Several handles may share one ledger file. Each write first reloads the
//! snapshot if the ledger head moved past it, and the append itself is
//! refused unless the head still matches the snapshot the write was built
//! on.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use af_config::EngineConfig;
use af_ledger::{Ledger, LedgerEntry, LedgerError, VerifyReport, canonical_timestamp};
use af_types::{
    Challenge, ChallengeId, EpistemicState, ErrorCode, Event, InferenceType, Lemma, LemmaId, Node,
    NodeId, NodeType, NonEmptyString, Role, TaintState,
};
use chrono::{DateTime, Utc};

use crate::challenges::{ChallengeEngine, Objection};
use crate::claims::ClaimManager;
use crate::clock::{Clock, SystemClock};
use crate::history::History;
use crate::jobs::{Job, JobSelector};
use crate::references::ReferenceResolver;
use crate::state::ProofState;
use crate::validation::{NodeDraft, ValidationEngine};
use crate::{Error, Result, taint};

/// Actor recorded on entries written by the claim reaper.
pub const REAPER_ACTOR: &str = "af-reaper";

/// An immutable view of the proof at one ledger position.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub state: ProofState,
    pub history: History,
}

pub struct Engine {
    config: EngineConfig,
    resolver: Arc<dyn ReferenceResolver>,
    clock: Arc<dyn Clock>,
    writer: Mutex<Ledger>,
    snapshot: RwLock<Arc<Snapshot>>,
}

/// Working copy for one write.
struct Transaction<'a> {
    state: ProofState,
    at: DateTime<Utc>,
    events: Vec<Event>,
    touched: BTreeSet<NodeId>,
    config: &'a EngineConfig,
    resolver: &'a dyn ReferenceResolver,
}

impl<'a> Transaction<'a> {
    fn new(
        state: ProofState,
        at: DateTime<Utc>,
        config: &'a EngineConfig,
        resolver: &'a dyn ReferenceResolver,
    ) -> Self {
        Self {
            state,
            at,
            events: Vec::new(),
            touched: BTreeSet::new(),
            config,
            resolver,
        }
    }

    fn validation(&self) -> ValidationEngine<'_> {
        ValidationEngine::new(&self.state, self.config, self.resolver)
    }

    fn claims(&self) -> ClaimManager<'_> {
        ClaimManager::new(&self.state)
    }

    fn challenges(&self) -> ChallengeEngine<'_> {
        ChallengeEngine::new(&self.state, self.config)
    }

    fn emit(&mut self, event: Event) -> Result<()> {
        self.state.apply(&event, self.at).map_err(|err| {
            Error::rejected(ErrorCode::ValidationInvariantFailed, err.to_string())
        })?;
        if changes_taint_inputs(&event) {
            self.touched.extend(event.node_ids().into_iter().cloned());
        }
        self.events.push(event);
        Ok(())
    }

    /// Recompute taint for every node whose inputs changed, and everything
    /// downstream of them.
    fn settle_taint(&mut self) -> Result<()> {
        if self.touched.is_empty() {
            return Ok(());
        }
        let seeds = std::mem::take(&mut self.touched);
        for event in taint::recompute(&self.state, &seeds) {
            self.emit(event)?;
        }
        Ok(())
    }
}

fn changes_taint_inputs(event: &Event) -> bool {
    matches!(
        event,
        Event::NodeCreated { .. }
            | Event::DependenciesAdded { .. }
            | Event::NodeValidated { .. }
            | Event::NodeAdmitted { .. }
            | Event::NodeRefuted { .. }
            | Event::NodeArchived { .. }
            | Event::RefinementRequested { .. }
            | Event::NodeReopened { .. }
    )
}

fn rebuild(ledger: &Ledger) -> Result<Snapshot> {
    let history = ledger.verified_entries()?;
    let state = ProofState::replay(&history).map_err(|(seq, err)| LedgerError::Inconsistent {
        position: seq,
        detail: err.to_string(),
    })?;
    Ok(Snapshot {
        state,
        history: History::from_entries(history),
    })
}

/// Whether `longer` contains all of `shorter` as its prefix.
fn extends(longer: &History, shorter: &History) -> bool {
    shorter.len() <= longer.len()
        && shorter.last().is_none_or(|last| {
            longer
                .get(shorter.len() - 1)
                .is_some_and(|entry| entry.hash == last.hash)
        })
}

impl Engine {
    /// Open (or create) the ledger at `path`, verify it and replay it.
    /// A ledger that fails verification is refused.
    pub fn open(
        path: impl AsRef<Path>,
        config: EngineConfig,
        resolver: Arc<dyn ReferenceResolver>,
    ) -> Result<Self> {
        let ledger = Ledger::open(path.as_ref())?;
        Self::from_ledger(ledger, config, resolver)
    }

    pub fn open_in_memory(
        config: EngineConfig,
        resolver: Arc<dyn ReferenceResolver>,
    ) -> Result<Self> {
        Self::from_ledger(Ledger::open_in_memory()?, config, resolver)
    }

    fn from_ledger(
        ledger: Ledger,
        config: EngineConfig,
        resolver: Arc<dyn ReferenceResolver>,
    ) -> Result<Self> {
        let snapshot = rebuild(&ledger)?;
        tracing::info!(
            entries = snapshot.history.len(),
            nodes = snapshot.state.node_count(),
            "Opened proof ledger"
        );
        Ok(Self {
            config,
            resolver,
            clock: Arc::new(SystemClock),
            writer: Mutex::new(ledger),
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    fn lock_writer(&self) -> MutexGuard<'_, Ledger> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        canonical_timestamp(self.clock.now())
    }

    fn write<T>(
        &self,
        actor: &str,
        operation: &'static str,
        build: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut ledger = self.lock_writer();
        self.catch_up(&ledger)?;
        let now = self.now();
        if let Err(err) = self.reap_expired(&mut ledger, now) {
            tracing::warn!(error = %err, "Claim reaper failed; continuing with the write");
        }

        let base = self.snapshot();
        let mut tx = Transaction::new(
            base.state.clone(),
            now,
            &self.config,
            self.resolver.as_ref(),
        );
        let value = build(&mut tx).inspect_err(|err| {
            tracing::debug!(operation, actor, code = %err.code(), "Write rejected");
        })?;
        tx.settle_taint()?;
        self.commit(&mut ledger, &base, actor, operation, tx)?;
        Ok(value)
    }

    /// Append the transaction's events and publish its state.
    fn commit(
        &self,
        ledger: &mut Ledger,
        base: &Snapshot,
        actor: &str,
        operation: &'static str,
        tx: Transaction<'_>,
    ) -> Result<Vec<LedgerEntry>> {
        if tx.events.is_empty() {
            return Ok(Vec::new());
        }
        let entries = ledger
            .append(base.state.last_seq(), actor, tx.at, &tx.events)
            .inspect_err(|err| {
                if matches!(err, LedgerError::Conflict { .. }) {
                    tracing::warn!(operation, actor, error = %err, "Ledger moved during the write");
                }
            })?;
        let mut state = tx.state;
        if let Some(last) = entries.last() {
            state.set_last_seq(last.seq);
        }
        let history = base.history.extended(&entries);
        tracing::debug!(
            operation,
            actor,
            first_seq = entries.first().map_or(0, |entry| entry.seq),
            seq = state.last_seq(),
            events = entries.len(),
            "Committed"
        );
        self.publish(Snapshot { state, history });
        Ok(entries)
    }

    fn publish(&self, snapshot: Snapshot) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    /// Reload the snapshot when another handle has appended to the ledger.
    fn catch_up(&self, ledger: &Ledger) -> Result<()> {
        let head = ledger.last_seq()?;
        let seen = self.snapshot().state.last_seq();
        if head == seen {
            return Ok(());
        }
        tracing::info!(seen, head, "Ledger advanced by another handle; reloading");
        self.publish(rebuild(ledger)?);
        Ok(())
    }

    fn reap_expired(&self, ledger: &mut Ledger, now: DateTime<Utc>) -> Result<Vec<NodeId>> {
        let base = self.snapshot();
        let expired = ClaimManager::new(&base.state).expired(now);
        if expired.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = Transaction::new(
            base.state.clone(),
            now,
            &self.config,
            self.resolver.as_ref(),
        );
        let mut reaped = Vec::with_capacity(expired.len());
        for event in expired {
            if let Event::LockReaped { node_id, owner } = &event {
                tracing::info!(node = %node_id, owner = %owner, "Reaping expired claim");
                reaped.push(node_id.clone());
            }
            tx.emit(event)?;
        }
        self.commit(ledger, &base, REAPER_ACTOR, "reap", tx)?;
        Ok(reaped)
    }

    /// Release every expired claim now. Returns the nodes released.
    pub fn reap(&self) -> Result<Vec<NodeId>> {
        let mut ledger = self.lock_writer();
        self.catch_up(&ledger)?;
        let now = self.now();
        self.reap_expired(&mut ledger, now)
    }

    /// Create the root claim for `conjecture`.
    pub fn init(&self, actor: &str, conjecture: &str) -> Result<NodeId> {
        self.write(actor, "init", |tx| {
            tx.validation().check_initialization()?;
            let root = Node::new(
                NodeId::root(),
                NodeType::Claim,
                conjecture,
                InferenceType::Assumption,
                tx.at,
                actor,
            );
            tx.emit(Event::ProofInitialized {
                conjecture: conjecture.to_owned(),
            })?;
            tx.emit(Event::NodeCreated { node: root })?;
            Ok(NodeId::root())
        })
    }

    /// Claim `id` for `owner`. `timeout` defaults to the configured claim
    /// timeout.
    pub fn claim(
        &self,
        id: &NodeId,
        owner: &str,
        role: Role,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let timeout_secs =
            timeout.map_or(self.config.claims.timeout_secs, |timeout| timeout.as_secs().max(1));
        self.write(owner, "claim", |tx| {
            let event = tx.claims().claim(id, owner, role, timeout_secs)?;
            tx.emit(event)
        })
    }

    pub fn release(&self, id: &NodeId, owner: &str) -> Result<()> {
        self.write(owner, "release", |tx| {
            let event = tx.claims().release(id, owner)?;
            tx.emit(event)
        })
    }

    /// Add `drafts` as new children of `parent`, in order. The actor must
    /// hold the claim on `parent`. Refining a node that was sent back for
    /// refinement reopens it.
    pub fn refine(&self, parent: &NodeId, actor: &str, drafts: &[NodeDraft]) -> Result<Vec<NodeId>> {
        if drafts.is_empty() {
            return Err(Error::rejected(
                ErrorCode::InvalidTarget,
                format!("no children proposed for {parent}"),
            ));
        }
        self.write(actor, "refine", |tx| {
            let mut created = Vec::with_capacity(drafts.len());
            for draft in drafts {
                let node = tx.validation().check_refinement(parent, draft, tx.at, actor)?;
                if created.is_empty() {
                    tx.claims().ensure_holder(parent, actor)?;
                    let reopen = tx.state.node(parent).is_some_and(|node| {
                        node.epistemic_state == EpistemicState::NeedsRefinement
                    });
                    if reopen {
                        tx.emit(Event::NodeReopened {
                            node_id: parent.clone(),
                        })?;
                    }
                }
                created.push(node.id.clone());
                tx.emit(Event::NodeCreated { node })?;
            }
            Ok(created)
        })
    }

    pub fn add_dependencies(
        &self,
        id: &NodeId,
        actor: &str,
        dependencies: BTreeSet<NodeId>,
        validation_deps: BTreeSet<NodeId>,
    ) -> Result<()> {
        self.write(actor, "add_dependencies", |tx| {
            tx.validation()
                .check_new_dependencies(id, &dependencies, &validation_deps)?;
            tx.claims().ensure_holder(id, actor)?;
            tx.emit(Event::DependenciesAdded {
                node_id: id.clone(),
                dependencies,
                validation_deps,
            })
        })
    }

    /// Apply a verdict or lifecycle change gated by `check`. Fails
    /// `ALREADY_CLAIMED` while someone else holds the node.
    fn decide(
        &self,
        id: &NodeId,
        actor: &str,
        operation: &'static str,
        check: impl FnOnce(&ValidationEngine<'_>) -> Result<()>,
        event: Event,
    ) -> Result<()> {
        self.write(actor, operation, |tx| {
            check(&tx.validation())?;
            tx.claims().ensure_not_held_by_other(id, actor)?;
            tx.emit(event)
        })
    }

    /// Mark `id` validated.
    pub fn accept(&self, id: &NodeId, actor: &str) -> Result<()> {
        self.decide(
            id,
            actor,
            "accept",
            |check| check.check_acceptance(id),
            Event::NodeValidated {
                node_id: id.clone(),
            },
        )
    }

    /// Accept `id` without proof. Its dependents become tainted.
    pub fn admit(&self, id: &NodeId, actor: &str) -> Result<()> {
        self.decide(
            id,
            actor,
            "admit",
            |check| check.check_admission(id),
            Event::NodeAdmitted {
                node_id: id.clone(),
            },
        )
    }

    pub fn refute(&self, id: &NodeId, actor: &str) -> Result<()> {
        self.decide(
            id,
            actor,
            "refute",
            |check| check.check_transition(id, EpistemicState::Refuted).map(drop),
            Event::NodeRefuted {
                node_id: id.clone(),
            },
        )
    }

    pub fn archive(&self, id: &NodeId, actor: &str) -> Result<()> {
        self.decide(
            id,
            actor,
            "archive",
            |check| check.check_transition(id, EpistemicState::Archived).map(drop),
            Event::NodeArchived {
                node_id: id.clone(),
            },
        )
    }

    pub fn request_refinement(&self, id: &NodeId, actor: &str, reason: &str) -> Result<()> {
        self.decide(
            id,
            actor,
            "request_refinement",
            |check| {
                check
                    .check_transition(id, EpistemicState::NeedsRefinement)
                    .map(drop)
            },
            Event::RefinementRequested {
                node_id: id.clone(),
                reason: reason.to_owned(),
            },
        )
    }

    pub fn raise_challenge(
        &self,
        id: &NodeId,
        actor: &str,
        objection: Objection,
    ) -> Result<ChallengeId> {
        self.write(actor, "raise_challenge", |tx| {
            let challenge_id = tx.state.next_challenge_id();
            let event = tx.challenges().raise(id, objection, actor, tx.at)?;
            tx.emit(event)?;
            Ok(challenge_id)
        })
    }

    pub fn resolve_challenge(
        &self,
        challenge_id: ChallengeId,
        actor: &str,
        resolution: NonEmptyString,
    ) -> Result<()> {
        self.write(actor, "resolve_challenge", |tx| {
            let event = tx.challenges().resolve(challenge_id, resolution)?;
            tx.emit(event)
        })
    }

    pub fn withdraw_challenge(&self, challenge_id: ChallengeId, actor: &str) -> Result<()> {
        self.write(actor, "withdraw_challenge", |tx| {
            let event = tx.challenges().withdraw(challenge_id)?;
            tx.emit(event)
        })
    }

    pub fn extract_lemma(&self, id: &NodeId, actor: &str) -> Result<LemmaId> {
        self.write(actor, "extract_lemma", |tx| {
            let lemma_id = tx.state.next_lemma_id();
            let node = tx.validation().check_extraction(id)?;
            let lemma = Lemma {
                id: lemma_id,
                source: id.clone(),
                statement: node.statement.clone(),
                source_hash: node.content_hash.clone(),
                extracted_by: actor.to_owned(),
            };
            tx.emit(Event::LemmaExtracted { lemma })?;
            Ok(lemma_id)
        })
    }

    /// Recompute taint for `id` and its dependents, recording any change.
    pub fn recompute_taint(&self, id: &NodeId, actor: &str) -> Result<TaintState> {
        self.write(actor, "recompute_taint", |tx| {
            tx.state.require(id)?;
            tx.touched.insert(id.clone());
            Ok(())
        })?;
        self.snapshot()
            .state
            .node(id)
            .map(|node| node.taint_state)
            .ok_or_else(|| Error::rejected(ErrorCode::InvalidTarget, format!("no node {id}")))
    }

    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------

    /// Check every stored hash and the sequence structure, then confirm
    /// that replaying the ledger reproduces the published state.
    ///
    /// A ledger that has grown past the published snapshot (another handle
    /// wrote to it) passes when the published head is still part of its
    /// chain; the snapshot is then reloaded.
    pub fn verify(&self) -> Result<VerifyReport> {
        let ledger = self.lock_writer();
        let rebuilt = rebuild(&ledger)?;
        let current = self.snapshot();
        let seen = current.state.last_seq();
        let head = rebuilt.state.last_seq();
        let diverged = if head == seen {
            rebuilt.state != current.state
        } else {
            head < seen || !extends(&rebuilt.history, &current.history)
        };
        if diverged {
            return Err(LedgerError::Inconsistent {
                position: head.min(seen),
                detail: "materialized state diverged from the ledger".to_owned(),
            }
            .into());
        }
        let report = VerifyReport {
            entries: rebuilt.history.len() as u64,
            head_hash: rebuilt.history.head_hash(),
        };
        if head != seen {
            tracing::info!(seen, head, "Ledger advanced by another handle; reloading");
            self.publish(rebuilt);
        }
        Ok(report)
    }

    /// Discard the materialized state and rebuild it from the ledger.
    pub fn replay(&self) -> Result<Arc<Snapshot>> {
        let ledger = self.lock_writer();
        let rebuilt = rebuild(&ledger)?;
        tracing::info!(
            entries = rebuilt.history.len(),
            nodes = rebuilt.state.node_count(),
            "Replayed proof ledger"
        );
        self.publish(rebuilt);
        Ok(self.snapshot())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.snapshot().state.node(id).cloned()
    }

    #[must_use]
    pub fn all_nodes(&self) -> Vec<Node> {
        self.snapshot().state.nodes().cloned().collect()
    }

    #[must_use]
    pub fn all_challenges(&self) -> Vec<Challenge> {
        self.snapshot().state.challenges().cloned().collect()
    }

    /// Open challenges, on one node or across the proof.
    #[must_use]
    pub fn open_challenges(&self, node: Option<&NodeId>) -> Vec<Challenge> {
        self.snapshot()
            .state
            .challenges()
            .filter(|challenge| challenge.is_open())
            .filter(|challenge| node.is_none_or(|id| &challenge.node_id == id))
            .cloned()
            .collect()
    }

    /// Whether every live child of `id` is validated or admitted.
    pub fn all_children_validated(&self, id: &NodeId) -> Result<bool> {
        let snapshot = self.snapshot();
        snapshot.state.require(id)?;
        Ok(snapshot.state.all_children_accepted(id))
    }

    #[must_use]
    pub fn history(&self) -> Vec<LedgerEntry> {
        self.snapshot().history.to_vec()
    }

    /// Entries that touched `id`, including resolutions of its challenges.
    #[must_use]
    pub fn node_history(&self, id: &NodeId) -> Vec<LedgerEntry> {
        let snapshot = self.snapshot();
        snapshot.history.matching(|entry| match &entry.event {
            Event::ChallengeResolved { challenge_id, .. }
            | Event::ChallengeWithdrawn { challenge_id } => snapshot
                .state
                .challenge(*challenge_id)
                .is_some_and(|challenge| &challenge.node_id == id),
            event => event.node_ids().contains(&id),
        })
    }

    #[must_use]
    pub fn lemmas(&self) -> Vec<Lemma> {
        self.snapshot().state.lemmas().cloned().collect()
    }

    #[must_use]
    pub fn prover_jobs(&self) -> Vec<Job> {
        JobSelector::new(&self.snapshot().state).prover_jobs()
    }

    #[must_use]
    pub fn verifier_jobs(&self) -> Vec<Job> {
        JobSelector::new(&self.snapshot().state).verifier_jobs()
    }
}

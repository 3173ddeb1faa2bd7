//! Structural legality of proposed mutations.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the parent exists and is live (`INVALID_PARENT`);
//! 2. the node type fits its context (`INVALID_TYPE`);
//! 3. the inference rule's premises are present (`INVALID_INFERENCE`);
//! 4. cited names and nodes resolve (`DEF_NOT_FOUND`, `ASSUMPTION_NOT_FOUND`,
//!    `EXTERNAL_NOT_FOUND`, `INVALID_TARGET`);
//! 5. local assumptions open and close properly (`SCOPE_VIOLATION`,
//!    `SCOPE_UNCLOSED`);
//! 6. the dependency graph stays acyclic (`DEPENDENCY_CYCLE`);
//! 7. depth, sibling count and open challenges stay within limits;
//! 8. extraction targets are validated and eligible (`EXTRACTION_INVALID`).
//!
//! Every check reads the current state and the candidate change only.

use std::collections::BTreeSet;

use af_config::EngineConfig;
use af_types::{
    EpistemicState, ErrorCode, InferenceType, Node, NodeId, NodeType, TaintState,
};
use chrono::{DateTime, Utc};

use crate::graph::find_cycle;
use crate::references::ReferenceResolver;
use crate::state::ProofState;
use crate::{Error, Result};

/// A child proposed by `refine`, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDraft {
    pub node_type: NodeType,
    pub statement: String,
    pub inference: InferenceType,
    pub dependencies: BTreeSet<NodeId>,
    pub validation_deps: BTreeSet<NodeId>,
    /// For `local_discharge`: the assumption to close. Defaults to the most
    /// recently opened assumption at that level.
    pub discharges: Option<NodeId>,
    pub definitions: BTreeSet<String>,
    pub assumptions: BTreeSet<String>,
    pub externals: BTreeSet<String>,
}

impl NodeDraft {
    #[must_use]
    pub fn new(node_type: NodeType, statement: impl Into<String>, inference: InferenceType) -> Self {
        Self {
            node_type,
            statement: statement.into(),
            inference,
            dependencies: BTreeSet::new(),
            validation_deps: BTreeSet::new(),
            discharges: None,
            definitions: BTreeSet::new(),
            assumptions: BTreeSet::new(),
            externals: BTreeSet::new(),
        }
    }

    /// Build from raw vocabulary text as a front-end receives it.
    pub fn parse(node_type: &str, statement: impl Into<String>, inference: &str) -> Result<Self> {
        Ok(Self::new(
            NodeType::parse(node_type)?,
            statement,
            InferenceType::parse(inference)?,
        ))
    }

    #[must_use]
    pub fn depends_on(mut self, id: NodeId) -> Self {
        self.dependencies.insert(id);
        self
    }

    /// A dependency that must also be accepted before this node is.
    #[must_use]
    pub fn validated_after(mut self, id: NodeId) -> Self {
        self.dependencies.insert(id.clone());
        self.validation_deps.insert(id);
        self
    }

    #[must_use]
    pub fn discharging(mut self, assumption: NodeId) -> Self {
        self.discharges = Some(assumption);
        self
    }

    #[must_use]
    pub fn citing_definition(mut self, name: impl Into<String>) -> Self {
        self.definitions.insert(name.into());
        self
    }

    #[must_use]
    pub fn citing_assumption(mut self, name: impl Into<String>) -> Self {
        self.assumptions.insert(name.into());
        self
    }

    #[must_use]
    pub fn citing_external(mut self, name: impl Into<String>) -> Self {
        self.externals.insert(name.into());
        self
    }
}

pub struct ValidationEngine<'a> {
    state: &'a ProofState,
    config: &'a EngineConfig,
    resolver: &'a dyn ReferenceResolver,
}

impl<'a> ValidationEngine<'a> {
    #[must_use]
    pub fn new(
        state: &'a ProofState,
        config: &'a EngineConfig,
        resolver: &'a dyn ReferenceResolver,
    ) -> Self {
        Self {
            state,
            config,
            resolver,
        }
    }

    pub fn check_initialization(&self) -> Result<()> {
        if self.state.contains(&NodeId::root()) || self.state.conjecture().is_some() {
            return Err(Error::rejected(
                ErrorCode::ValidationInvariantFailed,
                "proof is already initialized",
            ));
        }
        Ok(())
    }

    /// Validate `draft` as the next child of `parent` and build the node it
    /// would become.
    pub fn check_refinement(
        &self,
        parent_id: &NodeId,
        draft: &NodeDraft,
        created: DateTime<Utc>,
        actor: &str,
    ) -> Result<Node> {
        // 1. parent: live, and still open for refinement
        let parent = self
            .state
            .node(parent_id)
            .filter(|parent| !parent.is_archived())
            .ok_or_else(|| {
                Error::rejected(
                    ErrorCode::InvalidParent,
                    format!("no live node {parent_id} to refine"),
                )
            })?;
        if !matches!(
            parent.epistemic_state,
            EpistemicState::Pending | EpistemicState::NeedsRefinement
        ) {
            return Err(Error::rejected(
                ErrorCode::ValidationInvariantFailed,
                format!("node {parent_id} is {}", parent.epistemic_state),
            ));
        }
        let child_id = self.state.next_child_id(parent_id).map_err(|err| {
            Error::rejected(ErrorCode::RefinementLimitExceeded, err.to_string())
        })?;

        // 2. type in context
        self.check_type(parent, draft)?;

        // 3. inference premises
        let premises = draft.inference.premises();
        if draft.dependencies.len() < premises.min_dependencies {
            return Err(Error::rejected(
                ErrorCode::InvalidInference,
                format!(
                    "{} needs at least {} premise(s), got {}",
                    draft.inference,
                    premises.min_dependencies,
                    draft.dependencies.len()
                ),
            ));
        }
        if draft.definitions.len() < premises.min_definitions {
            return Err(Error::rejected(
                ErrorCode::InvalidInference,
                format!("{} must cite a definition", draft.inference),
            ));
        }

        // 4. references
        self.check_names(draft)?;
        self.check_dependency_targets(&draft.dependencies, &draft.validation_deps)?;
        if !draft.validation_deps.is_subset(&draft.dependencies) {
            return Err(Error::rejected(
                ErrorCode::InvalidTarget,
                "validation dependencies must also be dependencies",
            ));
        }
        if let Some(target) = &draft.discharges {
            self.require_assumption_node(target)?;
        }

        // 5. scope
        let open = self.state.open_assumptions_at(parent_id);
        let mut scope = parent.scope.clone();
        scope.extend(open.iter().cloned());
        let discharges = match draft.node_type {
            NodeType::LocalDischarge => {
                let target = draft
                    .discharges
                    .clone()
                    .or_else(|| open.last().cloned())
                    .ok_or_else(|| {
                        Error::rejected(
                            ErrorCode::ScopeViolation,
                            format!("no open assumption under {parent_id} to discharge"),
                        )
                    })?;
                if !open.contains(&target) {
                    return Err(Error::rejected(
                        ErrorCode::ScopeViolation,
                        format!("assumption {target} is not open under {parent_id}"),
                    ));
                }
                Some(target)
            }
            NodeType::Qed if !open.is_empty() => {
                return Err(Error::rejected(
                    ErrorCode::ScopeUnclosed,
                    format!("{} still open under {parent_id}", render(&open)),
                ));
            }
            _ => None,
        };
        self.check_dependency_scope(&draft.dependencies, &scope)?;

        // 6. acyclicity
        self.check_acyclic(&child_id, &draft.dependencies, &draft.validation_deps)?;

        // 7. limits
        let limits = &self.config.limits;
        if child_id.depth() > limits.max_depth {
            return Err(Error::rejected(
                ErrorCode::DepthExceeded,
                format!("{child_id} is deeper than {} levels", limits.max_depth),
            ));
        }
        let siblings = self.state.children(parent_id).count();
        if siblings >= limits.max_children {
            return Err(Error::rejected(
                ErrorCode::RefinementLimitExceeded,
                format!("{parent_id} already has {siblings} children"),
            ));
        }

        let mut node = Node::new(
            child_id,
            draft.node_type,
            draft.statement.clone(),
            draft.inference,
            created,
            actor,
        );
        node.dependencies.clone_from(&draft.dependencies);
        node.validation_deps.clone_from(&draft.validation_deps);
        node.scope = scope;
        node.discharges = discharges;
        node.definitions.clone_from(&draft.definitions);
        node.assumptions.clone_from(&draft.assumptions);
        node.externals.clone_from(&draft.externals);
        node.refresh_content_hash();
        Ok(node)
    }

    fn check_type(&self, parent: &Node, draft: &NodeDraft) -> Result<()> {
        let reject = |message: String| Err(Error::rejected(ErrorCode::InvalidType, message));
        if !parent.node_type.accepts_children() {
            return reject(format!(
                "{} node {} cannot be refined",
                parent.node_type, parent.id
            ));
        }
        if draft.node_type == NodeType::Case
            && !matches!(parent.node_type, NodeType::Claim | NodeType::Case)
        {
            return reject(format!("case cannot appear under {}", parent.node_type));
        }
        let bound_to_rule = matches!(
            draft.node_type,
            NodeType::LocalAssume | NodeType::LocalDischarge
        );
        match draft.inference.bound_node_type() {
            Some(bound) if bound != draft.node_type => {
                return reject(format!(
                    "{} steps must be {bound} nodes, not {}",
                    draft.inference, draft.node_type
                ));
            }
            None if bound_to_rule => {
                return reject(format!(
                    "{} nodes must use the {} rule",
                    draft.node_type, draft.node_type
                ));
            }
            _ => {}
        }
        if draft.discharges.is_some() && draft.node_type != NodeType::LocalDischarge {
            return reject(format!("{} nodes do not discharge", draft.node_type));
        }
        Ok(())
    }

    fn check_names(&self, draft: &NodeDraft) -> Result<()> {
        if let Some(name) = draft
            .definitions
            .iter()
            .find(|name| !self.resolver.has_definition(name))
        {
            return Err(Error::rejected(
                ErrorCode::DefNotFound,
                format!("unknown definition '{name}'"),
            ));
        }
        if let Some(name) = draft
            .assumptions
            .iter()
            .find(|name| !self.resolver.has_assumption(name))
        {
            return Err(Error::rejected(
                ErrorCode::AssumptionNotFound,
                format!("unknown assumption '{name}'"),
            ));
        }
        if let Some(name) = draft
            .externals
            .iter()
            .find(|name| !self.resolver.has_external(name))
        {
            return Err(Error::rejected(
                ErrorCode::ExternalNotFound,
                format!("unknown external reference '{name}'"),
            ));
        }
        Ok(())
    }

    fn check_dependency_targets(
        &self,
        dependencies: &BTreeSet<NodeId>,
        validation_deps: &BTreeSet<NodeId>,
    ) -> Result<()> {
        for dep in dependencies.iter().chain(validation_deps) {
            let node = self.state.require(dep)?;
            if node.is_archived() {
                return Err(Error::rejected(
                    ErrorCode::InvalidTarget,
                    format!("dependency {dep} is archived"),
                ));
            }
        }
        Ok(())
    }

    fn require_assumption_node(&self, id: &NodeId) -> Result<()> {
        match self.state.node(id) {
            Some(node) if node.node_type == NodeType::LocalAssume => Ok(()),
            _ => Err(Error::rejected(
                ErrorCode::AssumptionNotFound,
                format!("{id} is not a local assumption"),
            )),
        }
    }

    /// Every dependency must be visible from `scope`: its own scope is
    /// contained in it, and a local assumption cited directly is in force.
    fn check_dependency_scope(
        &self,
        dependencies: &BTreeSet<NodeId>,
        scope: &BTreeSet<NodeId>,
    ) -> Result<()> {
        for dep in dependencies {
            let node = self.state.require(dep)?;
            let leaked: BTreeSet<NodeId> = node.scope.difference(scope).cloned().collect();
            if !leaked.is_empty() {
                return Err(Error::rejected(
                    ErrorCode::ScopeViolation,
                    format!("{dep} relies on {} which is out of scope", render(&leaked)),
                ));
            }
            if node.node_type == NodeType::LocalAssume && !scope.contains(dep) {
                return Err(Error::rejected(
                    ErrorCode::ScopeViolation,
                    format!("assumption {dep} is not in force here"),
                ));
            }
        }
        Ok(())
    }

    fn check_acyclic(
        &self,
        node: &NodeId,
        dependencies: &BTreeSet<NodeId>,
        validation_deps: &BTreeSet<NodeId>,
    ) -> Result<()> {
        let proposed: Vec<(NodeId, NodeId)> = dependencies
            .iter()
            .chain(validation_deps)
            .map(|dep| (node.clone(), dep.clone()))
            .collect();
        match find_cycle(self.state, &proposed) {
            Some(cycle) => Err(Error::rejected(
                ErrorCode::DependencyCycle,
                format!("dependency cycle: {}", render_path(&cycle)),
            )),
            None => Ok(()),
        }
    }

    /// Validate adding dependency edges from an existing node.
    pub fn check_new_dependencies(
        &self,
        id: &NodeId,
        dependencies: &BTreeSet<NodeId>,
        validation_deps: &BTreeSet<NodeId>,
    ) -> Result<()> {
        let node = self.state.require(id)?;
        if node.is_archived() {
            return Err(Error::rejected(
                ErrorCode::InvalidTarget,
                format!("node {id} is archived"),
            ));
        }
        if !matches!(
            node.epistemic_state,
            EpistemicState::Pending | EpistemicState::NeedsRefinement
        ) {
            return Err(Error::rejected(
                ErrorCode::ValidationInvariantFailed,
                format!("node {id} is {}", node.epistemic_state),
            ));
        }
        if dependencies.is_empty() && validation_deps.is_empty() {
            return Err(Error::rejected(
                ErrorCode::InvalidTarget,
                "no dependencies given",
            ));
        }
        self.check_dependency_targets(dependencies, validation_deps)?;
        if let Some(stray) = validation_deps
            .iter()
            .find(|dep| !dependencies.contains(*dep) && !node.dependencies.contains(*dep))
        {
            return Err(Error::rejected(
                ErrorCode::InvalidTarget,
                format!("validation dependency {stray} is not a dependency of {id}"),
            ));
        }
        self.check_dependency_scope(dependencies, &node.scope)?;
        self.check_acyclic(id, dependencies, validation_deps)
    }

    /// The epistemic state machine permits `id -> next`.
    pub fn check_transition(&self, id: &NodeId, next: EpistemicState) -> Result<&'a Node> {
        let node = self.state.require(id)?;
        if !node.epistemic_state.can_transition_to(next) {
            return Err(Error::rejected(
                ErrorCode::ValidationInvariantFailed,
                format!("node {id} is {}, cannot become {next}", node.epistemic_state),
            ));
        }
        Ok(node)
    }

    fn check_unblocked(&self, node: &Node) -> Result<()> {
        let blocking = self.state.open_blocking_count(&node.id);
        if blocking > 0 {
            return Err(Error::rejected(
                ErrorCode::NodeBlocked,
                format!(
                    "node {} has {blocking} open blocking challenge(s)",
                    node.id
                ),
            ));
        }
        Ok(())
    }

    /// Preconditions for `accept`.
    pub fn check_acceptance(&self, id: &NodeId) -> Result<()> {
        let node = self.check_transition(id, EpistemicState::Validated)?;
        self.check_unblocked(node)?;

        let unfinished: BTreeSet<NodeId> = self
            .state
            .live_children(id)
            .filter(|child| !child.epistemic_state.is_accepted())
            .map(|child| child.id.clone())
            .collect();
        if !unfinished.is_empty() {
            return Err(Error::rejected(
                ErrorCode::NodeBlocked,
                format!("children {} are not yet accepted", render(&unfinished)),
            ));
        }

        let unmet: BTreeSet<NodeId> = node
            .dependencies
            .iter()
            .chain(&node.validation_deps)
            .filter_map(|dep| self.state.node(dep))
            .filter(|dep| !dep.is_archived() && !dep.epistemic_state.is_accepted())
            .map(|dep| dep.id.clone())
            .collect();
        if !unmet.is_empty() {
            return Err(Error::rejected(
                ErrorCode::NodeBlocked,
                format!("dependencies {} are not yet accepted", render(&unmet)),
            ));
        }

        let open = self.state.open_assumptions_at(id);
        if !open.is_empty() {
            return Err(Error::rejected(
                ErrorCode::ScopeUnclosed,
                format!("assumptions {} are never discharged", render(&open)),
            ));
        }
        Ok(())
    }

    /// Preconditions for `admit`: only blocking challenges gate it.
    pub fn check_admission(&self, id: &NodeId) -> Result<()> {
        let node = self.check_transition(id, EpistemicState::Admitted)?;
        self.check_unblocked(node)
    }

    pub fn check_extraction(&self, id: &NodeId) -> Result<&'a Node> {
        let node = self.state.require(id)?;
        let reason = if node.epistemic_state != EpistemicState::Validated {
            Some(format!("node {id} is {}, not validated", node.epistemic_state))
        } else if node.taint_state != TaintState::Clean {
            Some(format!("node {id} is {}", node.taint_state))
        } else if self.state.open_challenges_on(id).next().is_some() {
            Some(format!("node {id} has open challenges"))
        } else {
            self.state
                .lemma_for(id)
                .map(|lemma| format!("node {id} was already extracted as {}", lemma.id))
        };
        match reason {
            Some(message) => Err(Error::rejected(ErrorCode::ExtractionInvalid, message)),
            None => Ok(node),
        }
    }
}

fn render(ids: &BTreeSet<NodeId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_path(path: &[NodeId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

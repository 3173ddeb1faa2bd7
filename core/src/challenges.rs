//! Challenge lifecycle: raise, resolve, withdraw.
//!
//! Whether a challenge blocks is decided from its severity when it is
//! raised and recorded on the challenge itself.

use af_config::EngineConfig;
use af_types::{
    Challenge, ChallengeId, ChallengeSeverity, ChallengeStatus, ChallengeTarget, ErrorCode, Event,
    NodeId, NonEmptyString,
};
use chrono::{DateTime, Utc};

use crate::state::ProofState;
use crate::{Error, Result};

/// What a verifier objects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objection {
    pub target: ChallengeTarget,
    pub severity: ChallengeSeverity,
    pub reason: String,
}

impl Objection {
    #[must_use]
    pub fn new(target: ChallengeTarget, severity: ChallengeSeverity, reason: impl Into<String>) -> Self {
        Self {
            target,
            severity,
            reason: reason.into(),
        }
    }
}

pub struct ChallengeEngine<'a> {
    state: &'a ProofState,
    config: &'a EngineConfig,
}

impl<'a> ChallengeEngine<'a> {
    #[must_use]
    pub fn new(state: &'a ProofState, config: &'a EngineConfig) -> Self {
        Self { state, config }
    }

    pub fn raise(
        &self,
        node_id: &NodeId,
        objection: Objection,
        raised_by: &str,
        raised_at: DateTime<Utc>,
    ) -> Result<Event> {
        let node = self.state.require(node_id)?;
        if node.is_archived() {
            return Err(Error::rejected(
                ErrorCode::InvalidTarget,
                format!("node {node_id} is archived"),
            ));
        }
        let open = self.state.open_challenges_on(node_id).count();
        let limit = self.config.limits.max_open_challenges;
        if open >= limit {
            return Err(Error::rejected(
                ErrorCode::ChallengeLimitExceeded,
                format!("node {node_id} already has {open} open challenge(s), limit {limit}"),
            ));
        }
        Ok(Event::ChallengeRaised {
            challenge: Challenge {
                id: self.state.next_challenge_id(),
                node_id: node_id.clone(),
                target: objection.target,
                reason: objection.reason,
                severity: objection.severity,
                blocking: self.config.is_blocking(objection.severity),
                status: ChallengeStatus::Open,
                resolution: None,
                raised_by: raised_by.to_owned(),
                raised_at,
            },
        })
    }

    pub fn resolve(&self, id: ChallengeId, resolution: NonEmptyString) -> Result<Event> {
        self.require_open(id)?;
        Ok(Event::ChallengeResolved {
            challenge_id: id,
            resolution,
        })
    }

    pub fn withdraw(&self, id: ChallengeId) -> Result<Event> {
        self.require_open(id)?;
        Ok(Event::ChallengeWithdrawn { challenge_id: id })
    }

    fn require_open(&self, id: ChallengeId) -> Result<&'a Challenge> {
        match self.state.challenge(id) {
            Some(challenge) if challenge.is_open() => Ok(challenge),
            Some(challenge) => Err(Error::rejected(
                ErrorCode::ChallengeNotFound,
                format!("challenge {id} is already {}", challenge.status),
            )),
            None => Err(Error::rejected(
                ErrorCode::ChallengeNotFound,
                format!("no challenge {id}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{at, id, small_tree};
    use af_types::WorkflowState;

    fn raise(
        state: &mut ProofState,
        config: &EngineConfig,
        node: &str,
        severity: ChallengeSeverity,
    ) -> Result<ChallengeId> {
        let event = ChallengeEngine::new(state, config).raise(
            &id(node),
            Objection::new(ChallengeTarget::Inference, severity, "does not follow"),
            "verifier",
            at(),
        )?;
        let Event::ChallengeRaised { challenge } = &event else {
            unreachable!("raise builds challenge_raised");
        };
        let challenge_id = challenge.id;
        state.apply(&event, at()).unwrap();
        Ok(challenge_id)
    }

    #[test]
    fn blocking_follows_configured_severities() {
        let mut state = small_tree();
        let config = EngineConfig::default();
        let minor = raise(&mut state, &config, "1.1", ChallengeSeverity::Minor).unwrap();
        assert!(!state.challenge(minor).unwrap().blocking);
        assert_eq!(
            state.node(&id("1.1")).unwrap().workflow_state,
            WorkflowState::Available
        );

        let major = raise(&mut state, &config, "1.1", ChallengeSeverity::Major).unwrap();
        assert_eq!(major.to_string(), "ch-2");
        assert_eq!(
            state.node(&id("1.1")).unwrap().workflow_state,
            WorkflowState::Blocked
        );

        let event = ChallengeEngine::new(&state, &config)
            .withdraw(major)
            .unwrap();
        state.apply(&event, at()).unwrap();
        assert_eq!(
            state.node(&id("1.1")).unwrap().workflow_state,
            WorkflowState::Available
        );
    }

    #[test]
    fn open_challenge_limit() {
        let mut state = small_tree();
        let mut config = EngineConfig::default();
        config.limits.max_open_challenges = 1;
        raise(&mut state, &config, "1", ChallengeSeverity::Note).unwrap();
        let err = raise(&mut state, &config, "1", ChallengeSeverity::Note).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ChallengeLimitExceeded);
        assert_eq!(
            raise(&mut state, &config, "1.5", ChallengeSeverity::Note)
                .unwrap_err()
                .code(),
            ErrorCode::InvalidTarget
        );
    }

    #[test]
    fn only_open_challenges_can_be_closed() {
        let mut state = small_tree();
        let config = EngineConfig::default();
        let ch = raise(&mut state, &config, "1", ChallengeSeverity::Critical).unwrap();
        let engine = ChallengeEngine::new(&state, &config);
        let resolution = NonEmptyString::new("rewrote the step").unwrap();
        let event = engine.resolve(ch, resolution.clone()).unwrap();
        state.apply(&event, at()).unwrap();

        let engine = ChallengeEngine::new(&state, &config);
        assert_eq!(
            engine.resolve(ch, resolution).unwrap_err().code(),
            ErrorCode::ChallengeNotFound
        );
        assert_eq!(
            engine.withdraw(ChallengeId::new(9)).unwrap_err().code(),
            ErrorCode::ChallengeNotFound
        );
        assert_eq!(state.challenge(ch).unwrap().status, ChallengeStatus::Resolved);
    }
}

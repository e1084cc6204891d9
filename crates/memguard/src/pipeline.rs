//! One pass through the guard
//!
//! draft -> trust label -> note -> context pack -> policy gate -> boundary
//!
//! The boundary only runs when the gate allows. Nothing is executed here;
//! `executed` reports whether a real executor would have been reached.

use crate::boundary::{BoundaryValidator, ValidationOutcome};
use crate::config::{ConfigError, GuardConfig};
use crate::gate::{PolicyDecision, PolicyGate};
use crate::mode::PolicyMode;
use crate::note::{ContextPack, Note, NoteDraft};
use crate::trust::TrustEngine;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything a forensic reader needs about one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub mode: PolicyMode,
    pub note: Note,
    pub citations: Vec<String>,
    pub target: String,
    pub decision: PolicyDecision,
    pub validation: Option<ValidationOutcome>,
    pub executed: bool,
}

/// Trust engine, gate and boundary sharing one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    trust: TrustEngine,
    gate: PolicyGate,
    boundary: BoundaryValidator,
}

impl Pipeline {
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            trust: TrustEngine::new(config.clone()),
            gate: PolicyGate::new(config.clone())?,
            boundary: BoundaryValidator::new(config),
        })
    }

    /// Run `draft` through every layer.
    ///
    /// Without an explicit `target`, the one the note itself asks for is used,
    /// the way a planner following the note would.
    pub fn run(
        &self,
        id: i64,
        draft: NoteDraft,
        target: Option<&str>,
        mode: PolicyMode,
    ) -> PipelineOutcome {
        let note = self.trust.create_note(id, draft, mode);
        let target = match target {
            Some(t) => t.to_string(),
            None => self.gate.extractor().extract(&note.content).unwrap_or_default(),
        };

        let pack = ContextPack::new(vec![note.clone()]);
        let citations = pack.citations();
        let decision = self.gate.evaluate(&pack, &target, mode);

        let validation = decision
            .is_allowed()
            .then(|| self.boundary.validate(&target));
        let executed = validation.as_ref().is_some_and(|v| v.accepted);

        info!(%mode, target_value = %target, executed, "pipeline finished");

        PipelineOutcome {
            mode,
            note,
            citations,
            target,
            decision,
            validation,
            executed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Decision;
    use crate::note::TrustLevel;

    fn pipeline() -> Pipeline {
        Pipeline::new(GuardConfig::default()).unwrap()
    }

    #[test]
    fn test_verified_clean_note_executes() {
        let draft = NoteDraft::new(
            "Check health.\nset target to: serviceB",
            ["runbook"],
            "internal:verified",
        );
        let outcome = pipeline().run(1, draft, None, PolicyMode::Conservative);
        assert_eq!(outcome.target, "serviceB");
        assert_eq!(outcome.decision.decision, Decision::Allow);
        assert!(outcome.executed);
        assert_eq!(outcome.citations, vec!["memory:1"]);
    }

    #[test]
    fn test_blocked_gate_skips_boundary() {
        let draft = NoteDraft::new("set target to: serviceC", ["runbook"], "internal:verified");
        let outcome = pipeline().run(1, draft, None, PolicyMode::Conservative);
        assert_eq!(outcome.decision.decision, Decision::Block);
        assert!(outcome.validation.is_none());
        assert!(!outcome.executed);
    }

    #[test]
    fn test_explicit_target_overrides_note() {
        let draft = NoteDraft::new("set target to: serviceA", ["runbook"], "internal:verified");
        let outcome = pipeline().run(1, draft, Some("serviceA;rm"), PolicyMode::Naive);
        assert_eq!(outcome.target, "serviceA;rm");
        assert!(outcome.decision.is_allowed());
        assert!(!outcome.executed);
    }

    #[test]
    fn test_naive_mode_trusts_tagged_note() {
        let draft = NoteDraft::new(
            "set target to: serviceA",
            ["runbook", "diagnostics"],
            "web_fixture:clean_runbook.md",
        );
        let outcome = pipeline().run(9, draft, None, PolicyMode::Naive);
        assert_eq!(outcome.note.trust_level, TrustLevel::Trusted);
        assert!(!outcome.decision.enforced);
        assert!(outcome.executed);
    }

    #[test]
    fn test_missing_target_never_executes() {
        let draft = NoteDraft::new("restart the pod", ["runbook"], "internal:verified");
        let outcome = pipeline().run(1, draft, None, PolicyMode::Naive);
        assert_eq!(outcome.target, "");
        assert!(!outcome.executed);
    }
}

//! Policy gate over retrieved context
//!
//! In conservative mode every note in a pack goes through three independent
//! rules: provenance, literal forbidden token, and allowlisted target. All
//! rules run for all notes so the decision lists every violation, not just
//! the first one.
//!
//! The token rule is a literal substring check on purpose. Encoded or
//! disguised payloads are the boundary validator's job.

use crate::config::{ConfigError, GuardConfig};
use crate::mode::PolicyMode;
use crate::note::{ContextPack, Note};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub const REASON_POLICY_DISABLED: &str = "policy disabled";
pub const REASON_CHECKS_PASSED: &str = "policy checks passed";
pub const REASON_TOKEN_NOT_CONFIGURED: &str = "forbidden token not configured";
pub const REASON_EMPTY_ALLOWLIST: &str = "allowlist is empty; nothing is allowed";

/// Gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Block => "block",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one gate evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub reasons: Vec<String>,
    pub enforced: bool,
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// Pulls the target a note asks for out of its content.
///
/// The earliest configured directive wins (matched case-insensitively);
/// the target is the rest of that line, trimmed.
#[derive(Debug, Clone)]
pub struct TargetExtractor {
    pattern: Option<Regex>,
}

impl TargetExtractor {
    pub fn new(directives: &[String]) -> Result<Self, ConfigError> {
        let alternatives: Vec<String> = directives
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let source = format!(r"(?:{})[ \t]*([^\r\n]*)", alternatives.join("|"));
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|_| ConfigError::InvalidDirective(directives.join(", ")))?;

        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// `None` when no directive is present or it names nothing
    pub fn extract(&self, content: &str) -> Option<String> {
        let captures = self.pattern.as_ref()?.captures(content)?;
        let target = captures.get(1)?.as_str().trim();
        if target.is_empty() {
            None
        } else {
            Some(target.to_string())
        }
    }
}

/// The layered gate in front of the planner/executor
#[derive(Debug, Clone)]
pub struct PolicyGate {
    config: GuardConfig,
    extractor: TargetExtractor,
}

impl PolicyGate {
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        let extractor = TargetExtractor::new(&config.target_directives)?;
        Ok(Self { config, extractor })
    }

    pub fn extractor(&self) -> &TargetExtractor {
        &self.extractor
    }

    /// Decide whether `pack` may drive an action on `proposed_target`
    pub fn evaluate(
        &self,
        pack: &ContextPack,
        proposed_target: &str,
        mode: PolicyMode,
    ) -> PolicyDecision {
        if !mode.enforces() {
            warn!(proposed = proposed_target, notes = pack.len(), "policy gate disabled");
            return PolicyDecision {
                decision: Decision::Allow,
                reasons: vec![REASON_POLICY_DISABLED.to_string()],
                enforced: false,
            };
        }

        let mut reasons = Vec::new();

        if self.config.forbidden_token.is_empty() {
            reasons.push(REASON_TOKEN_NOT_CONFIGURED.to_string());
        }
        if self.config.allowlist.is_empty() {
            reasons.push(REASON_EMPTY_ALLOWLIST.to_string());
        }

        for note in pack {
            reasons.extend(self.check_note(note));
        }

        let decision = if reasons.is_empty() {
            reasons.push(REASON_CHECKS_PASSED.to_string());
            Decision::Allow
        } else {
            Decision::Block
        };

        info!(
            proposed = proposed_target,
            notes = pack.len(),
            %decision,
            ?reasons,
            "policy decision"
        );

        PolicyDecision {
            decision,
            reasons,
            enforced: true,
        }
    }

    /// Every rule for one note, none skipped
    fn check_note(&self, note: &Note) -> Vec<String> {
        let provenance = self.check_provenance(note);
        let token = self.check_token(note);
        let allowlist = self.check_allowlist(note);

        [provenance, token, allowlist].into_iter().flatten().collect()
    }

    fn check_provenance(&self, note: &Note) -> Option<String> {
        if !self.config.is_untrusted_provenance(&note.provenance) {
            return None;
        }
        Some(format!(
            "note {}: provenance '{}' is an untrusted source",
            note.id, note.provenance
        ))
    }

    fn check_token(&self, note: &Note) -> Option<String> {
        let token = &self.config.forbidden_token;
        if token.is_empty() || !note.content.contains(token.as_str()) {
            return None;
        }
        Some(format!("note {}: forbidden token in content", note.id))
    }

    fn check_allowlist(&self, note: &Note) -> Option<String> {
        let Some(target) = self.extractor.extract(&note.content) else {
            debug!(id = note.id, "no target in note, allowlist check skipped");
            return None;
        };
        if self.config.is_allowed(&target) {
            return None;
        }
        Some(format!("note {}: target '{}' not in allowlist", note.id, target))
    }
}

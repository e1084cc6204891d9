//! Boundary validation at the point of privileged action
//!
//! Runs on the concrete target regardless of what the policy gate decided,
//! so a disabled or fooled gate is not enough on its own to reach execution.
//! Every check runs; the first failing one names the rejection.

use crate::config::GuardConfig;
use crate::obfuscation::{detect, ObfuscationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const REASON_ACCEPTED: &str = "target accepted";
pub const REASON_SUSPICIOUS: &str = "suspicious substring";
pub const REASON_NOT_ALLOWLISTED: &str = "target not in allowlist";
pub const REASON_TOKEN_NOT_CONFIGURED: &str = "forbidden token not configured";

/// Shell metacharacters and sigils that never belong in a target
pub const SUSPICIOUS_SUBSTRINGS: [&str; 5] = [";", "&&", "|", "`", "$"];

/// Verdict for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub reason: String,
    pub obfuscation: ObfuscationResult,
}

/// Validate `target` against an allowlist and forbidden token
pub fn validate(
    target: &str,
    allowlist: &BTreeSet<String>,
    forbidden: &str,
) -> ValidationOutcome {
    let obfuscation = detect(target, forbidden);
    let suspicious = has_suspicious_substring(target);
    let allowed = allowlist.contains(target);

    let rejection = if forbidden.is_empty() {
        Some(REASON_TOKEN_NOT_CONFIGURED.to_string())
    } else if obfuscation.detected {
        Some(format!("obfuscated token: {}", obfuscation.method))
    } else if suspicious {
        Some(REASON_SUSPICIOUS.to_string())
    } else if !allowed {
        Some(REASON_NOT_ALLOWLISTED.to_string())
    } else {
        None
    };

    match rejection {
        Some(reason) => {
            warn!(target_value = target, %reason, method = %obfuscation.method, "boundary rejected target");
            ValidationOutcome {
                accepted: false,
                reason,
                obfuscation,
            }
        }
        None => {
            info!(target_value = target, "boundary accepted target");
            ValidationOutcome {
                accepted: true,
                reason: REASON_ACCEPTED.to_string(),
                obfuscation,
            }
        }
    }
}

/// Whitespace, shell metacharacters or variable sigils
pub fn has_suspicious_substring(target: &str) -> bool {
    target.chars().any(char::is_whitespace)
        || SUSPICIOUS_SUBSTRINGS.iter().any(|s| target.contains(s))
}

/// Validator bound to a configuration
#[derive(Debug, Clone, Default)]
pub struct BoundaryValidator {
    config: GuardConfig,
}

impl BoundaryValidator {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, target: &str) -> ValidationOutcome {
        validate(target, &self.config.allowlist, &self.config.forbidden_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscation::ObfuscationMethod;

    const TOKEN: &str = "WRITE_PWNED_FILE";

    fn allow(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plaintext_token_rejected() {
        let outcome = validate("serviceA WRITE_PWNED_FILE", &allow(&["serviceA"]), TOKEN);
        assert!(!outcome.accepted);
        assert_eq!(outcome.reason, "obfuscated token: plaintext");
        assert_eq!(outcome.obfuscation.method, ObfuscationMethod::Plaintext);
    }

    #[test]
    fn test_base64_token_rejected() {
        // base64("serviceA WRITE_PWNED_FILE")
        let outcome = validate(
            "c2VydmljZUEgV1JJVEVfUFdORURfRklMRQ==",
            &allow(&["serviceA"]),
            TOKEN,
        );
        assert!(!outcome.accepted);
        assert_eq!(outcome.reason, "obfuscated token: base64");
        assert_eq!(outcome.obfuscation.method, ObfuscationMethod::Base64);
    }

    #[test]
    fn test_homoglyph_token_rejected() {
        let outcome = validate("serviceA WR\u{0399}TE_PWNED_FILE", &allow(&["serviceA"]), TOKEN);
        assert_eq!(outcome.reason, "obfuscated token: homoglyph");
        assert!(outcome.obfuscation.detected);
    }

    #[test]
    fn test_suspicious_substrings() {
        let allowlist = allow(&["serviceA"]);
        for target in ["serviceA;id", "serviceA&&id", "serviceA|id", "`id`", "$HOME", "service\tA"] {
            let outcome = validate(target, &allowlist, TOKEN);
            assert!(!outcome.accepted, "{target} should be rejected");
            assert_eq!(outcome.reason, REASON_SUSPICIOUS);
            assert!(!outcome.obfuscation.detected);
        }
    }

    #[test]
    fn test_allowlist_is_exact() {
        let allowlist = allow(&["serviceA"]);
        assert_eq!(validate("serviceC", &allowlist, TOKEN).reason, REASON_NOT_ALLOWLISTED);
        assert_eq!(validate("servicea", &allowlist, TOKEN).reason, REASON_NOT_ALLOWLISTED);
        assert_eq!(validate("", &allowlist, TOKEN).reason, REASON_NOT_ALLOWLISTED);
    }

    #[test]
    fn test_accepts_allowlisted_target() {
        let outcome = validate("serviceA", &allow(&["serviceA", "serviceB"]), TOKEN);
        assert!(outcome.accepted);
        assert_eq!(outcome.reason, REASON_ACCEPTED);
        assert_eq!(outcome.obfuscation, ObfuscationResult::not_detected());
    }

    #[test]
    fn test_absent_configuration_rejects() {
        assert_eq!(validate("serviceA", &allow(&[]), TOKEN).reason, REASON_NOT_ALLOWLISTED);

        let outcome = validate("serviceA", &allow(&["serviceA"]), "");
        assert!(!outcome.accepted);
        assert_eq!(outcome.reason, REASON_TOKEN_NOT_CONFIGURED);
    }

    #[test]
    fn test_bound_validator_uses_config() {
        let validator = BoundaryValidator::default();
        assert!(validator.validate("serviceB").accepted);
        assert!(!validator.validate("serviceB WRITE_PWNED_FILE").accepted);
    }
}

//! Guard configuration management
//!
//! Configuration file: ~/.config/memguard/memguard.yaml
//!
//! Missing files fall back to defaults. A configuration that leaves the
//! forbidden token or allowlist empty is rejected by `validate` at startup;
//! the engine itself still fails safe if handed one at call time.

use crate::mode::PolicyMode;
use anyhow::{Context, Result};
use memguard_core::Paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Configuration problems that must be fixed before the guard runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("forbidden token is empty")]
    EmptyForbiddenToken,

    #[error("allowlist is empty - nothing would ever be allowed")]
    EmptyAllowlist,

    #[error("no target directives configured")]
    NoTargetDirectives,

    #[error("invalid target directive: {0:?}")]
    InvalidDirective(String),
}

/// Global guard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Mode used by the CLI when none is given on the command line
    #[serde(default)]
    pub mode: PolicyMode,

    /// Token that must never reach a privileged action
    #[serde(default = "default_forbidden_token")]
    pub forbidden_token: String,

    /// Exhaustive set of permitted targets
    #[serde(default = "default_allowlist")]
    pub allowlist: BTreeSet<String>,

    /// Provenance prefixes naming untrusted sources
    #[serde(default = "default_untrusted_prefixes")]
    pub untrusted_prefixes: Vec<String>,

    /// Phrases that introduce a target inside note content
    #[serde(default = "default_target_directives")]
    pub target_directives: Vec<String>,

    /// Audit settings
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::default(),
            forbidden_token: default_forbidden_token(),
            allowlist: default_allowlist(),
            untrusted_prefixes: default_untrusted_prefixes(),
            target_directives: default_target_directives(),
            audit: AuditConfig::default(),
        }
    }
}

impl GuardConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let paths = Paths::new();
        Self::load_from(&paths.config_file("memguard"))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read guard config from {:?}", path))?;
            let config: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse guard config from {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<()> {
        let paths = Paths::new();
        self.save_to(&paths.config_file("memguard"))
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check for settings that would silently weaken the guard
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.forbidden_token.is_empty() {
            return Err(ConfigError::EmptyForbiddenToken);
        }
        if self.allowlist.is_empty() {
            return Err(ConfigError::EmptyAllowlist);
        }
        if self.target_directives.is_empty() {
            return Err(ConfigError::NoTargetDirectives);
        }
        if let Some(bad) = self.target_directives.iter().find(|d| d.trim().is_empty()) {
            return Err(ConfigError::InvalidDirective(bad.clone()));
        }
        Ok(())
    }

    /// Whether a provenance names one of the reserved untrusted sources
    pub fn is_untrusted_provenance(&self, provenance: &str) -> bool {
        self.untrusted_prefixes
            .iter()
            .any(|prefix| provenance.starts_with(prefix.as_str()))
    }

    pub fn is_allowed(&self, target: &str) -> bool {
        self.allowlist.contains(target)
    }
}

fn default_forbidden_token() -> String {
    "WRITE_PWNED_FILE".to_string()
}

fn default_allowlist() -> BTreeSet<String> {
    ["serviceA", "serviceB"].iter().map(|s| s.to_string()).collect()
}

fn default_untrusted_prefixes() -> Vec<String> {
    vec!["web_fixture".to_string()]
}

fn default_target_directives() -> Vec<String> {
    vec!["target to:".to_string(), "target:".to_string()]
}

/// Audit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,

    /// Retention in days
    #[serde(default = "default_audit_retention_days")]
    pub retention_days: u32,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_retention_days() -> u32 {
    30
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            retention_days: default_audit_retention_days(),
        }
    }
}

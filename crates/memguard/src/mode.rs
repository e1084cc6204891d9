//! Operating modes for the engine
//!
//! The mode is a plain value handed to every call that cares about it.
//! Nothing in the engine reads it from ambient state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy mode selected by the invoking pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Pattern-based trust and no enforcement at the gate.
    /// Reproduces the flawed behavior under study.
    #[serde(alias = "vulnerable")]
    Naive,

    /// Provenance-based trust: nothing is trusted without outside
    /// verification, and every gate rule is enforced.
    #[serde(alias = "defended")]
    Conservative,
}

impl Default for PolicyMode {
    fn default() -> Self {
        PolicyMode::Conservative
    }
}

impl PolicyMode {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "naive" | "vulnerable" => Some(PolicyMode::Naive),
            "conservative" | "defended" => Some(PolicyMode::Conservative),
            _ => None,
        }
    }

    /// Get the string name
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyMode::Naive => "naive",
            PolicyMode::Conservative => "conservative",
        }
    }

    /// Whether the policy gate enforces its rules in this mode
    pub fn enforces(&self) -> bool {
        matches!(self, PolicyMode::Conservative)
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Memguard - Trust and policy decisions for agent memory
//!
//! Agent pipelines summarize outside content into shared memory and later
//! act on it. Memguard decides three things along that path:
//!
//! - what trust label a note gets when it is written
//! - whether retrieved notes may drive a privileged action at all
//! - whether the concrete target of that action is safe to execute
//!
//! The last check runs independently of the others, so a single upstream
//! mistake (a note wrongly labelled trusted, a disabled gate) cannot by
//! itself reach execution.

pub mod audit;
pub mod boundary;
pub mod config;
pub mod fixtures;
pub mod gate;
pub mod mode;
pub mod note;
pub mod obfuscation;
pub mod pipeline;
pub mod trust;

pub use audit::AuditLog;
pub use boundary::{BoundaryValidator, ValidationOutcome};
pub use config::{ConfigError, GuardConfig};
pub use gate::{Decision, PolicyDecision, PolicyGate};
pub use mode::PolicyMode;
pub use note::{ContextPack, Note, NoteDraft, TrustLevel};
pub use obfuscation::{detect, ObfuscationMethod, ObfuscationResult};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use trust::{assign_trust, TrustEngine};

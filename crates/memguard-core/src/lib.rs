//! Memguard Core - Shared functionality for Memguard tools
//!
//! Memory-poisoning defenses for agent pipelines: trust labels, policy gates
//! and a last-line boundary check in front of privileged actions.

pub mod paths;

pub use paths::Paths;

//! Notes and context packs
//!
//! A `Note` is produced once by the trust engine and handed to storage.
//! Nothing in this crate mutates a note after it has been created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Binary trust label carried by a stored note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// May influence privileged decisions
    Trusted,
    /// Must not influence privileged decisions
    Untrusted,
}

impl Default for TrustLevel {
    fn default() -> Self {
        TrustLevel::Untrusted
    }
}

impl TrustLevel {
    /// Get the string name
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Trusted => "trusted",
            TrustLevel::Untrusted => "untrusted",
        }
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, TrustLevel::Trusted)
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Content as delivered by ingestion, before a trust label exists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteDraft {
    /// Summarized text
    pub content: String,

    /// Descriptive tags (e.g. "runbook", "diagnostics")
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Where the content came from (e.g. "web_fixture:poisoned_runbook.md")
    pub provenance: String,
}

impl NoteDraft {
    pub fn new<I, S>(content: impl Into<String>, tags: I, provenance: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            content: content.into(),
            tags: tags.into_iter().map(Into::into).collect(),
            provenance: provenance.into(),
        }
    }
}

/// A persisted record of ingested content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub trust_level: TrustLevel,
    pub provenance: String,
    #[serde(default)]
    pub risk_flags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Ordered notes returned for one retrieval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextPack {
    notes: Vec<Note>,
}

impl ContextPack {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Trusted as soon as any single note is trusted.
    ///
    /// This mirrors how a retriever summarizes a pack; it is informational
    /// and plays no part in gate decisions.
    pub fn effective_trust(&self) -> TrustLevel {
        if self.notes.iter().any(|n| n.trust_level.is_trusted()) {
            TrustLevel::Trusted
        } else {
            TrustLevel::Untrusted
        }
    }

    /// Citation labels in pack order ("memory:<id>")
    pub fn citations(&self) -> Vec<String> {
        self.notes.iter().map(|n| format!("memory:{}", n.id)).collect()
    }
}

impl From<Vec<Note>> for ContextPack {
    fn from(notes: Vec<Note>) -> Self {
        Self::new(notes)
    }
}

impl<'a> IntoIterator for &'a ContextPack {
    type Item = &'a Note;
    type IntoIter = std::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.iter()
    }
}

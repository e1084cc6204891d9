//! Audit trail for gate decisions and boundary validations
//!
//! Reasons and detected methods are written verbatim so the trail can be
//! read back as forensic evidence.
//! Storage: ~/.local/share/memguard/audit.log (JSON lines)

use crate::boundary::ValidationOutcome;
use crate::gate::{Decision, PolicyDecision};
use crate::mode::PolicyMode;
use crate::note::ContextPack;
use crate::obfuscation::ObfuscationMethod;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use memguard_core::Paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Which layer produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Gate,
    Boundary,
}

impl Stage {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gate" => Some(Stage::Gate),
            "boundary" => Some(Stage::Boundary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Gate => "gate",
            Stage::Boundary => "boundary",
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the decision was made
    pub timestamp: DateTime<Utc>,

    pub stage: Stage,

    /// Mode the gate ran in (the boundary has none)
    pub mode: Option<PolicyMode>,

    /// Target under consideration
    pub target: String,

    /// Allow for an allowed/accepted target, block otherwise
    pub verdict: Decision,

    /// Reasons exactly as the layer reported them
    pub reasons: Vec<String>,

    /// Obfuscation method found by the boundary
    pub obfuscation: ObfuscationMethod,

    /// Notes that informed the decision
    #[serde(default)]
    pub note_ids: Vec<i64>,
}

impl AuditEntry {
    /// Create from a gate decision
    pub fn from_decision(
        decision: &PolicyDecision,
        pack: &ContextPack,
        target: &str,
        mode: PolicyMode,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            stage: Stage::Gate,
            mode: Some(mode),
            target: target.to_string(),
            verdict: decision.decision,
            reasons: decision.reasons.clone(),
            obfuscation: ObfuscationMethod::None,
            note_ids: pack.notes().iter().map(|n| n.id).collect(),
        }
    }

    /// Create from a boundary validation
    pub fn from_validation(outcome: &ValidationOutcome, target: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            stage: Stage::Boundary,
            mode: None,
            target: target.to_string(),
            verdict: if outcome.accepted {
                Decision::Allow
            } else {
                Decision::Block
            },
            reasons: vec![outcome.reason.clone()],
            obfuscation: outcome.obfuscation.method,
            note_ids: Vec::new(),
        }
    }
}

/// Audit log manager
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Create a new audit log at the default location
    pub fn new() -> Self {
        let paths = Paths::new();
        Self::with_path(paths.data.join("audit.log"))
    }

    /// Create with custom path
    pub fn with_path(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append an entry to the log
    pub fn log(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open audit log at {:?}", self.log_path))?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Query recent entries
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query(AuditQuery::default().limit(limit))
    }

    /// Query blocked or rejected entries
    pub fn blocked(&self) -> Result<Vec<AuditEntry>> {
        self.query(AuditQuery::default().verdict(Decision::Block))
    }

    /// Query with custom filter
    pub fn query(&self, query: AuditQuery) -> Result<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)?;
        let reader = BufReader::new(file);

        let mut entries: Vec<AuditEntry> = reader
            .lines()
            .filter_map(|line| line.ok().and_then(|l| serde_json::from_str(&l).ok()))
            .filter(|entry: &AuditEntry| query.matches(entry))
            .collect();

        // Most recent first
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }

        Ok(entries)
    }

    /// Drop entries older than the retention window
    pub fn cleanup(&self, retention_days: i64) -> Result<usize> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let threshold = Utc::now() - Duration::days(retention_days);

        let file = File::open(&self.log_path)?;
        let reader = BufReader::new(file);

        let mut kept: Vec<String> = Vec::new();
        let mut removed = 0;

        for line in reader.lines() {
            let line = line?;
            if let Ok(entry) = serde_json::from_str::<AuditEntry>(&line) {
                if entry.timestamp >= threshold {
                    kept.push(line);
                } else {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            let mut file = File::create(&self.log_path)?;
            for line in kept {
                writeln!(file, "{}", line)?;
            }
        }

        Ok(removed)
    }

    /// Get statistics
    pub fn stats(&self, since: Option<DateTime<Utc>>) -> Result<AuditStats> {
        let mut query = AuditQuery::default();
        if let Some(since) = since {
            query = query.since(since);
        }

        let mut stats = AuditStats::default();

        for entry in self.query(query)? {
            stats.total += 1;
            match entry.verdict {
                Decision::Allow => stats.allowed += 1,
                Decision::Block => stats.blocked += 1,
            }
            match entry.stage {
                Stage::Gate => stats.gate += 1,
                Stage::Boundary => stats.boundary += 1,
            }
            if entry.obfuscation != ObfuscationMethod::None {
                *stats
                    .obfuscation
                    .entry(entry.obfuscation.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }

        Ok(stats)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Query parameters for audit log
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    stage: Option<Stage>,
    verdict: Option<Decision>,
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

impl AuditQuery {
    /// Filter by stage
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Filter by verdict
    pub fn verdict(mut self, verdict: Decision) -> Self {
        self.verdict = Some(verdict);
        self
    }

    /// Filter by time
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Limit results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(stage) = self.stage {
            if entry.stage != stage {
                return false;
            }
        }

        if let Some(verdict) = self.verdict {
            if entry.verdict != verdict {
                return false;
            }
        }

        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }

        true
    }
}

/// Audit statistics
#[derive(Debug, Clone, Default)]
pub struct AuditStats {
    pub total: usize,
    pub allowed: usize,
    pub blocked: usize,
    pub gate: usize,
    pub boundary: usize,
    /// Detections per obfuscation method
    pub obfuscation: BTreeMap<String, usize>,
}

impl AuditStats {
    /// Percentage of decisions that blocked
    pub fn block_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.blocked as f64) / (self.total as f64) * 100.0
    }
}

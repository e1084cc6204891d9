//! memguard - Trust and policy decisions for agent memory
//!
//! "Tags are not credentials."

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use memguard::{
    audit::{AuditEntry, AuditLog, AuditQuery, Stage},
    config::GuardConfig,
    fixtures::Fixture,
    gate::{Decision, PolicyGate},
    mode::PolicyMode,
    note::{ContextPack, Note, NoteDraft},
    obfuscation::detect,
    pipeline::{Pipeline, PipelineOutcome},
    trust::TrustEngine,
    BoundaryValidator,
};

/// memguard - Trust and policy decisions for agent memory
#[derive(Parser)]
#[command(name = "memguard")]
#[command(version = "0.1.0")]
#[command(about = "Trust assignment, policy gating and boundary validation for agent memory")]
#[command(long_about = "Trust assignment, policy gating and boundary validation for agent memory.\n\n\
    Notes summarized from outside content are labelled when written, gated when\n\
    retrieved, and their targets are checked again right before execution.\n\n\
    Tags are not credentials.")]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a string for the forbidden token
    #[command(about = "Detect the forbidden token in plaintext, homoglyph or base64 form")]
    Detect {
        /// String to inspect
        candidate: String,

        /// Token to look for (defaults to the configured one)
        #[arg(long)]
        token: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Label content as it would be stored
    #[command(about = "Assign a trust label to content")]
    Assign {
        /// Note content
        content: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Provenance of the content
        #[arg(long)]
        provenance: String,

        /// Note id to assign
        #[arg(long, default_value = "1")]
        id: i64,

        /// naive or conservative
        #[arg(long)]
        mode: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the policy gate over stored notes
    #[command(about = "Evaluate a context pack (JSON list of notes)")]
    Evaluate {
        /// JSON file holding the notes
        #[arg(long)]
        notes: PathBuf,

        /// Proposed target
        #[arg(long, default_value = "")]
        target: String,

        /// naive or conservative
        #[arg(long)]
        mode: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a target at the execution boundary
    #[command(about = "Validate a target right before execution")]
    Validate {
        /// Target to validate
        target: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run built-in fixtures through every layer
    #[command(about = "Simulate the full path for one or all fixtures")]
    Simulate {
        /// clean, poisoned, base64 or homoglyph (all when omitted)
        #[arg(long)]
        fixture: Option<String>,

        /// naive or conservative
        #[arg(long)]
        mode: Option<String>,

        /// Override the target the note asks for
        #[arg(long)]
        target: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query the audit log
    #[command(about = "Query the memguard audit log")]
    Audit {
        /// gate or boundary
        #[arg(long)]
        stage: Option<String>,

        /// Show only blocked or rejected entries
        #[arg(long)]
        blocked: bool,

        /// Show entries since (e.g., "1h", "1d", "1w")
        #[arg(long)]
        since: Option<String>,

        /// Limit number of results
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Drop entries older than the configured retention first
        #[arg(long)]
        cleanup: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show audit statistics
    #[command(about = "Show decision statistics")]
    Stats {
        /// Show stats since (e.g., "1h", "1d", "1w")
        #[arg(long)]
        since: Option<String>,
    },

    /// Write the default configuration
    #[command(about = "Initialize default memguard configuration")]
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let path = cli.config;

    match cli.command {
        Commands::Detect {
            candidate,
            token,
            json,
        } => cmd_detect(&load_config(path)?, candidate, token, json),
        Commands::Assign {
            content,
            tags,
            provenance,
            id,
            mode,
            json,
        } => cmd_assign(&load_config(path)?, content, tags, provenance, id, mode, json),
        Commands::Evaluate {
            notes,
            target,
            mode,
            json,
        } => cmd_evaluate(&load_config(path)?, notes, target, mode, json),
        Commands::Validate { target, json } => cmd_validate(&load_config(path)?, target, json),
        Commands::Simulate {
            fixture,
            mode,
            target,
            json,
        } => cmd_simulate(&load_config(path)?, fixture, mode, target, json),
        Commands::Audit {
            stage,
            blocked,
            since,
            limit,
            cleanup,
            json,
        } => cmd_audit(&load_config(path)?, stage, blocked, since, limit, cleanup, json),
        Commands::Stats { since } => cmd_stats(since),
        Commands::Init { force } => cmd_init(path, force),
    }
}

/// Load and validate configuration; a weakened config is a startup error
fn load_config(path: Option<PathBuf>) -> Result<GuardConfig> {
    let config = match path {
        Some(p) => GuardConfig::load_from(&p)?,
        None => GuardConfig::load()?,
    };
    config.validate().context("Invalid memguard configuration")?;
    Ok(config)
}

fn resolve_mode(config: &GuardConfig, mode: Option<String>) -> Result<PolicyMode> {
    match mode {
        None => Ok(config.mode),
        Some(s) => match PolicyMode::from_str(&s) {
            Some(m) => Ok(m),
            None => bail!("Unknown mode: {} (expected naive or conservative)", s),
        },
    }
}

/// Append to the audit log; failures are reported but never change a verdict
fn record(config: &GuardConfig, entry: &AuditEntry) {
    if !config.audit.enabled {
        return;
    }
    if let Err(e) = AuditLog::new().log(entry) {
        warn!(error = %e, "failed to write audit entry");
    }
}

fn cmd_detect(
    config: &GuardConfig,
    candidate: String,
    token: Option<String>,
    json_output: bool,
) -> Result<()> {
    let token = token.unwrap_or_else(|| config.forbidden_token.clone());
    let result = detect(&candidate, &token);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.detected {
        println!("DETECTED: {} ({})", token, result.method);
    } else {
        println!("CLEAN: {} not found", token);
    }

    std::process::exit(if result.detected { 1 } else { 0 })
}

fn cmd_assign(
    config: &GuardConfig,
    content: String,
    tags: Vec<String>,
    provenance: String,
    id: i64,
    mode: Option<String>,
    json_output: bool,
) -> Result<()> {
    let mode = resolve_mode(config, mode)?;
    let engine = TrustEngine::new(config.clone());
    let note = engine.create_note(id, NoteDraft::new(content, tags, provenance), mode);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!("Note {} ({} mode)", note.id, mode);
        println!("  Trust level: {}", note.trust_level);
        println!("  Provenance: {}", note.provenance);
        let tags: Vec<&str> = note.tags.iter().map(|s| s.as_str()).collect();
        println!("  Tags: {}", tags.join(", "));
        if note.risk_flags.is_empty() {
            println!("  Risk flags: none");
        } else {
            let flags: Vec<&str> = note.risk_flags.iter().map(|s| s.as_str()).collect();
            println!("  Risk flags: {}", flags.join(", "));
        }
    }

    Ok(())
}

fn cmd_evaluate(
    config: &GuardConfig,
    notes_path: PathBuf,
    target: String,
    mode: Option<String>,
    json_output: bool,
) -> Result<()> {
    let mode = resolve_mode(config, mode)?;
    let content = std::fs::read_to_string(&notes_path)
        .with_context(|| format!("Failed to read notes from {:?}", notes_path))?;
    let notes: Vec<Note> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse notes from {:?}", notes_path))?;
    let pack = ContextPack::new(notes);

    let gate = PolicyGate::new(config.clone())?;
    let decision = gate.evaluate(&pack, &target, mode);
    record(config, &AuditEntry::from_decision(&decision, &pack, &target, mode));

    if json_output {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        println!(
            "{}: {} note(s), effective trust {} ({} mode{})",
            decision.decision.as_str().to_uppercase(),
            pack.len(),
            pack.effective_trust(),
            mode,
            if decision.enforced { "" } else { ", not enforced" }
        );
        for reason in &decision.reasons {
            println!("  - {}", reason);
        }
    }

    std::process::exit(if decision.is_allowed() { 0 } else { 1 })
}

fn cmd_validate(config: &GuardConfig, target: String, json_output: bool) -> Result<()> {
    let validator = BoundaryValidator::new(config.clone());
    let outcome = validator.validate(&target);
    record(config, &AuditEntry::from_validation(&outcome, &target));

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let verdict = if outcome.accepted { "ACCEPT" } else { "REJECT" };
        println!("{}: {}", verdict, target);
        println!("  Reason: {}", outcome.reason);
        if outcome.obfuscation.detected {
            println!("  Obfuscation: {}", outcome.obfuscation.method);
        }
    }

    std::process::exit(if outcome.accepted { 0 } else { 1 })
}

fn cmd_simulate(
    config: &GuardConfig,
    fixture: Option<String>,
    mode: Option<String>,
    target: Option<String>,
    json_output: bool,
) -> Result<()> {
    let mode = resolve_mode(config, mode)?;
    let fixtures = match fixture {
        None => Fixture::ALL.to_vec(),
        Some(name) => match Fixture::from_str(&name) {
            Some(f) => vec![f],
            None => bail!("Unknown fixture: {}", name),
        },
    };

    let pipeline = Pipeline::new(config.clone())?;
    let mut outcomes: Vec<(Fixture, PipelineOutcome)> = Vec::new();

    for (i, fixture) in fixtures.into_iter().enumerate() {
        let outcome = pipeline.run(i as i64 + 1, fixture.draft(), target.as_deref(), mode);

        let pack = ContextPack::new(vec![outcome.note.clone()]);
        record(
            config,
            &AuditEntry::from_decision(&outcome.decision, &pack, &outcome.target, mode),
        );
        if let Some(validation) = &outcome.validation {
            record(config, &AuditEntry::from_validation(validation, &outcome.target));
        }

        outcomes.push((fixture, outcome));
    }

    if json_output {
        let list: Vec<&PipelineOutcome> = outcomes.iter().map(|(_, o)| o).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!("Simulation ({} mode)", mode);
    println!("{}", "=".repeat(70));
    println!(
        "{:<12} {:<10} {:<8} {:<26} {}",
        "FIXTURE", "TRUST", "GATE", "BOUNDARY", "EXECUTED"
    );
    println!("{}", "-".repeat(70));

    for (fixture, outcome) in &outcomes {
        let boundary = match &outcome.validation {
            Some(v) => v.reason.clone(),
            None => "not reached".to_string(),
        };
        println!(
            "{:<12} {:<10} {:<8} {:<26} {}",
            fixture.as_str(),
            outcome.note.trust_level.as_str(),
            outcome.decision.decision.as_str(),
            boundary,
            if outcome.executed { "yes" } else { "no" }
        );
    }

    let executed = outcomes.iter().filter(|(_, o)| o.executed).count();
    println!();
    println!("Reached execution: {}/{}", executed, outcomes.len());

    Ok(())
}

fn cmd_audit(
    config: &GuardConfig,
    stage: Option<String>,
    blocked: bool,
    since: Option<String>,
    limit: usize,
    cleanup: bool,
    json_output: bool,
) -> Result<()> {
    let audit = AuditLog::new();

    if cleanup {
        let removed = audit.cleanup(i64::from(config.audit.retention_days))?;
        println!(
            "Removed {} entries older than {} days from {:?}",
            removed,
            config.audit.retention_days,
            audit.path()
        );
    }

    let mut query = AuditQuery::default().limit(limit);

    if let Some(s) = stage {
        match Stage::from_str(&s) {
            Some(stage) => query = query.stage(stage),
            None => bail!("Unknown stage: {} (expected gate or boundary)", s),
        }
    }

    if blocked {
        query = query.verdict(Decision::Block);
    }

    if let Some(since_str) = since {
        query = query.since(parse_duration(&since_str)?);
    }

    let entries = audit.query(query)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!(
            "{:<18} {:<9} {:<6} {:<24} {}",
            "TIMESTAMP", "STAGE", "VERDICT", "TARGET", "REASONS"
        );
        println!("{}", "-".repeat(80));

        for entry in entries {
            let time_str = entry.timestamp.format("%Y-%m-%d %H:%M").to_string();
            let target_short = if entry.target.chars().count() > 22 {
                format!("{}...", entry.target.chars().take(22).collect::<String>())
            } else {
                entry.target.clone()
            };

            println!(
                "{:<18} {:<9} {:<6} {:<24} {}",
                time_str,
                entry.stage.as_str(),
                entry.verdict.as_str(),
                target_short,
                entry.reasons.join("; ")
            );
        }
    }

    Ok(())
}

fn cmd_stats(since: Option<String>) -> Result<()> {
    let audit = AuditLog::new();

    let since_time = match since {
        Some(s) => Some(parse_duration(&s)?),
        None => None,
    };

    let stats = audit.stats(since_time)?;

    println!("Memguard Statistics");
    println!("{}", "=".repeat(40));
    println!();
    println!("Total decisions: {}", stats.total);
    println!("  Allowed: {}", stats.allowed);
    println!("  Blocked: {}", stats.blocked);
    println!();
    println!("Gate decisions: {}", stats.gate);
    println!("Boundary checks: {}", stats.boundary);
    println!();
    println!("Block rate: {:.1}%", stats.block_rate());

    if stats.obfuscation.is_empty() {
        println!("No obfuscation detected");
    } else {
        println!("Obfuscation detected:");
        for (method, count) in &stats.obfuscation {
            println!("  {}: {} time(s)", method, count);
        }
    }

    Ok(())
}

fn cmd_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let config = GuardConfig::default();
    let config_path = path.unwrap_or_else(|| memguard_core::Paths::new().config_file("memguard"));

    if config_path.exists() && !force {
        println!("Config already exists at {:?}", config_path);
        println!("Use --force to overwrite");
        return Ok(());
    }

    config.save_to(&config_path)?;
    println!("Created default memguard config at {:?}", config_path);

    Ok(())
}

/// Parse a duration string like "1h", "1d", "1w" into a DateTime
fn parse_duration(s: &str) -> Result<chrono::DateTime<Utc>> {
    let s = s.trim();
    let Some((split, unit)) = s.char_indices().last() else {
        bail!("Invalid duration: {:?}", s);
    };
    let num: i64 = s[..split]
        .parse()
        .with_context(|| format!("Invalid duration: {:?}", s))?;

    let duration = match unit {
        'm' => Duration::try_minutes(num),
        'h' => Duration::try_hours(num),
        'd' => Duration::try_days(num),
        'w' => Duration::try_weeks(num),
        _ => bail!("Unknown duration unit: {}", unit),
    };

    match duration.and_then(|d| Utc::now().checked_sub_signed(d)) {
        Some(time) => Ok(time),
        None => bail!("Duration out of range: {:?}", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        let now = Utc::now();
        let hour_ago = parse_duration("1h").unwrap();
        assert!(hour_ago < now);
        assert!(now - hour_ago >= Duration::minutes(59));
        assert!(parse_duration("2w").unwrap() < parse_duration("1d").unwrap());
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for input in ["", "h", "1", "1y", "abc", "1\u{00e9}", "\u{00e9}"] {
            assert!(parse_duration(input).is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert!(parse_duration("99999999999999w").is_err());
        assert!(parse_duration("9223372036854775807m").is_err());
    }
}

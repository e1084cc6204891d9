//! Every fixture through every layer, in both modes

use base64::{engine::general_purpose::STANDARD, Engine as _};
use memguard::{
    assign_trust, detect, fixtures::Fixture, gate::Decision, BoundaryValidator, ContextPack,
    GuardConfig, ObfuscationMethod, Pipeline, PolicyGate, PolicyMode, TrustEngine, TrustLevel,
};
use std::collections::BTreeSet;

const TOKEN: &str = "WRITE_PWNED_FILE";

fn pipeline() -> Pipeline {
    Pipeline::new(GuardConfig::default()).unwrap()
}

fn tags(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn conservative_blocks_every_fixture_at_the_gate() {
    let pipeline = pipeline();

    for (id, fixture) in Fixture::ALL.into_iter().enumerate() {
        let id = id as i64 + 1;
        let outcome = pipeline.run(id, fixture.draft(), None, PolicyMode::Conservative);

        assert_eq!(outcome.note.trust_level, TrustLevel::Untrusted, "{fixture}");
        assert_eq!(outcome.decision.decision, Decision::Block, "{fixture}");
        assert!(outcome.decision.enforced);
        assert!(outcome.validation.is_none(), "{fixture}");
        assert!(!outcome.executed, "{fixture}");

        let provenance = format!(
            "note {}: provenance '{}' is an untrusted source",
            id,
            fixture.provenance()
        );
        assert_eq!(outcome.decision.reasons[0], provenance, "{fixture}");

        let expected = match fixture {
            Fixture::Clean => 1,
            Fixture::Poisoned => 3,
            Fixture::Base64 | Fixture::Homoglyph => 2,
        };
        assert_eq!(outcome.decision.reasons.len(), expected, "{fixture}");
    }
}

#[test]
fn naive_mode_relies_on_the_boundary() {
    let pipeline = pipeline();

    for fixture in Fixture::ALL {
        let outcome = pipeline.run(1, fixture.draft(), None, PolicyMode::Naive);

        assert_eq!(outcome.note.trust_level, TrustLevel::Trusted, "{fixture}");
        assert_eq!(outcome.decision.reasons, vec!["policy disabled"]);
        assert!(!outcome.decision.enforced);

        let validation = outcome.validation.expect("gate allows in naive mode");
        let expected = match fixture {
            Fixture::Clean => ObfuscationMethod::None,
            Fixture::Poisoned => ObfuscationMethod::Plaintext,
            Fixture::Base64 => ObfuscationMethod::Base64,
            Fixture::Homoglyph => ObfuscationMethod::Homoglyph,
        };
        assert_eq!(validation.obfuscation.method, expected, "{fixture}");
        assert_eq!(validation.accepted, fixture == Fixture::Clean, "{fixture}");
        assert_eq!(outcome.executed, fixture == Fixture::Clean, "{fixture}");
    }
}

#[test]
fn conservative_trust_ignores_tags() {
    for set in [
        tags(&[]),
        tags(&["runbook"]),
        tags(&["runbook", "diagnostics"]),
        tags(&["runbook", "diagnostics", "verified"]),
    ] {
        assert_eq!(
            assign_trust("anything", &set, "internal:verified", PolicyMode::Conservative),
            TrustLevel::Untrusted
        );
    }
}

#[test]
fn naive_trust_needs_both_tags() {
    let both = tags(&["runbook", "diagnostics"]);
    assert_eq!(
        assign_trust("x", &both, "web_fixture:x", PolicyMode::Naive),
        TrustLevel::Trusted
    );
    for partial in [tags(&["runbook"]), tags(&["diagnostics"]), tags(&["Runbook", "diagnostics"])] {
        assert_eq!(
            assign_trust("x", &partial, "web_fixture:x", PolicyMode::Naive),
            TrustLevel::Untrusted
        );
    }
}

#[test]
fn detector_recognizes_each_disguise() {
    assert_eq!(detect(TOKEN, TOKEN).method, ObfuscationMethod::Plaintext);
    assert_eq!(detect("WR\u{0399}TE_PWNED_FILE", TOKEN).method, ObfuscationMethod::Homoglyph);
    assert_eq!(detect(&STANDARD.encode(TOKEN), TOKEN).method, ObfuscationMethod::Base64);

    let clean = detect("serviceA", TOKEN);
    assert!(!clean.detected);
    assert_eq!(clean.method, ObfuscationMethod::None);
}

#[test]
fn verified_pack_passes_the_gate() {
    let engine = TrustEngine::default();
    let gate = PolicyGate::new(GuardConfig::default()).unwrap();

    let draft = memguard::NoteDraft::new(
        "Check health.\nset target to: serviceA",
        ["runbook"],
        "internal:verified",
    );
    let pack = ContextPack::new(vec![engine.create_note(1, draft, PolicyMode::Conservative)]);

    let decision = gate.evaluate(&pack, "serviceA", PolicyMode::Conservative);
    assert_eq!(decision.decision, Decision::Allow);
    assert_eq!(decision.reasons, vec!["policy checks passed"]);
}

#[test]
fn boundary_rejects_smuggled_targets() {
    let validator = BoundaryValidator::default();

    let plain = validator.validate("serviceA WRITE_PWNED_FILE");
    assert!(!plain.accepted);
    assert_eq!(plain.obfuscation.method, ObfuscationMethod::Plaintext);

    let encoded = validator.validate(&STANDARD.encode("serviceA WRITE_PWNED_FILE"));
    assert!(!encoded.accepted);
    assert_eq!(encoded.obfuscation.method, ObfuscationMethod::Base64);
}

#[test]
fn repeated_runs_agree() {
    let pipeline = pipeline();
    let validator = BoundaryValidator::default();

    for fixture in Fixture::ALL {
        let target = fixture.target();
        assert_eq!(detect(target, TOKEN), detect(target, TOKEN));
        assert_eq!(validator.validate(target), validator.validate(target));

        for mode in [PolicyMode::Naive, PolicyMode::Conservative] {
            let first = pipeline.run(1, fixture.draft(), None, mode);
            let second = pipeline.run(1, fixture.draft(), None, mode);
            assert_eq!(first.decision, second.decision);
            assert_eq!(first.validation, second.validation);
            assert_eq!(first.executed, second.executed);
        }
    }
}

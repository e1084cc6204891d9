//! Obfuscation detection for forbidden tokens
//!
//! A candidate string is checked in a fixed order, cheapest first:
//!
//! 1. plaintext substring match
//! 2. the same match after folding confusable characters to ASCII
//! 3. the same match inside any base64 run that decodes to UTF-8 text
//!
//! The first positive check wins. A string that stacks two techniques
//! reports only the first one found.
//!
//! Base64 runs are maximal, so `/` and `+` glued to a payload become part of
//! the run. `serviceA/<payload>` therefore decodes as one malformed run and
//! the payload is missed; such a target still fails the allowlist.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

/// Minimum length of a run of base64 alphabet characters worth decoding
pub const MIN_BASE64_RUN: usize = 16;

/// Upper bound on base64 runs decoded per candidate.
///
/// Runs past this many are never decoded, so a payload hidden behind enough
/// decoy runs goes undetected here and must be caught by the allowlist.
pub const MAX_BASE64_CANDIDATES: usize = 64;

static BASE64_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("[A-Za-z0-9+/]{{{},}}={{0,2}}", MIN_BASE64_RUN))
        .expect("base64 run pattern is a valid regex")
});

/// Standard alphabet, padding optional
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How a forbidden token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObfuscationMethod {
    None,
    Plaintext,
    Homoglyph,
    Base64,
}

impl ObfuscationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObfuscationMethod::None => "none",
            ObfuscationMethod::Plaintext => "plaintext",
            ObfuscationMethod::Homoglyph => "homoglyph",
            ObfuscationMethod::Base64 => "base64",
        }
    }

    /// True for the disguised forms (anything beyond a literal match)
    pub fn is_disguised(&self) -> bool {
        matches!(self, ObfuscationMethod::Homoglyph | ObfuscationMethod::Base64)
    }
}

impl fmt::Display for ObfuscationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObfuscationResult {
    pub detected: bool,
    pub method: ObfuscationMethod,
}

impl ObfuscationResult {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            method: ObfuscationMethod::None,
        }
    }

    pub fn found(method: ObfuscationMethod) -> Self {
        Self {
            detected: true,
            method,
        }
    }
}

impl Default for ObfuscationResult {
    fn default() -> Self {
        Self::not_detected()
    }
}

/// Look for `forbidden` in `candidate` in plaintext, homoglyph or base64 form.
///
/// Never fails: malformed encodings are skipped and an empty token is
/// reported as not detected. Callers that need fail-safe behavior for a
/// missing token must check for it themselves.
pub fn detect(candidate: &str, forbidden: &str) -> ObfuscationResult {
    if forbidden.is_empty() {
        return ObfuscationResult::not_detected();
    }

    if candidate.contains(forbidden) {
        return ObfuscationResult::found(ObfuscationMethod::Plaintext);
    }

    if let Cow::Owned(folded) = normalize_confusables(candidate) {
        if folded.contains(forbidden) {
            return ObfuscationResult::found(ObfuscationMethod::Homoglyph);
        }
    }

    if base64_runs_contain(candidate, forbidden) {
        return ObfuscationResult::found(ObfuscationMethod::Base64);
    }

    ObfuscationResult::not_detected()
}

fn base64_runs_contain(candidate: &str, forbidden: &str) -> bool {
    BASE64_RUN
        .find_iter(candidate)
        .take(MAX_BASE64_CANDIDATES)
        .filter_map(|run| BASE64.decode(run.as_str()).ok())
        .filter_map(|bytes| String::from_utf8(bytes).ok())
        .any(|text| text.contains(forbidden))
}

/// Replace every mapped confusable with its ASCII look-alike.
///
/// Borrows when nothing needed replacing.
pub fn normalize_confusables(input: &str) -> Cow<'_, str> {
    if !input.chars().any(|c| confusable(c).is_some()) {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.chars().map(|c| confusable(c).unwrap_or(c)).collect())
}

/// Closed confusable table. Not case folding: only code points that render
/// like an ASCII character are mapped.
pub fn confusable(c: char) -> Option<char> {
    let mapped = match c {
        // Greek capitals
        'Α' => 'A',
        'Β' => 'B',
        'Ε' => 'E',
        'Ζ' => 'Z',
        'Η' => 'H',
        'Ι' => 'I',
        'Κ' => 'K',
        'Μ' => 'M',
        'Ν' => 'N',
        'Ο' => 'O',
        'Ρ' => 'P',
        'Τ' => 'T',
        'Υ' => 'Y',
        'Χ' => 'X',
        // Greek small
        'ο' => 'o',
        'ν' => 'v',
        'ρ' => 'p',
        // Cyrillic capitals
        'А' => 'A',
        'В' => 'B',
        'Е' => 'E',
        'К' => 'K',
        'М' => 'M',
        'Н' => 'H',
        'О' => 'O',
        'Р' => 'P',
        'С' => 'C',
        'Т' => 'T',
        'Х' => 'X',
        'Ѕ' => 'S',
        'І' => 'I',
        'Ј' => 'J',
        'Ԁ' => 'D',
        'Ԛ' => 'Q',
        'Ԝ' => 'W',
        // Cyrillic small
        'а' => 'a',
        'е' => 'e',
        'о' => 'o',
        'р' => 'p',
        'с' => 'c',
        'у' => 'y',
        'х' => 'x',
        'ѕ' => 's',
        'і' => 'i',
        'ј' => 'j',
        'ԁ' => 'd',
        'һ' => 'h',
        'ԛ' => 'q',
        'ԝ' => 'w',
        // Roman numerals
        'Ⅰ' => 'I',
        'Ⅴ' => 'V',
        'Ⅹ' => 'X',
        'Ⅼ' => 'L',
        'Ⅽ' => 'C',
        'Ⅾ' => 'D',
        'Ⅿ' => 'M',
        // Fullwidth ASCII block (U+FF01..U+FF5E)
        '\u{FF01}'..='\u{FF5E}' => return char::from_u32(c as u32 - 0xFEE0),
        _ => return None,
    };
    Some(mapped)
}

//! Content-addressed masking of personal identifiers.
//!
//! Every match becomes `[<label>:<fp>]`, where `fp` is the first 8 hex
//! characters of the SHA-256 of the matched text. The same input always yields
//! the same placeholder, so redacted text stays comparable across requests.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap();

    // Optional country digit, 2-3 digit area code (optionally parenthesised), 3-4 + 4 digits
    static ref PHONE_REGEX: Regex = Regex::new(
        r"\+?[0-9]?[\s.-]?(?:\([0-9]{2,3}\)|[0-9]{2,3})[\s.-]?[0-9]{3,4}[\s.-]?[0-9]{4}"
    ).unwrap();

    // Hex (0x...) or base58 addresses
    static ref WALLET_REGEX: Regex =
        Regex::new(r"0x[a-fA-F0-9]{32,}|[13][a-km-zA-HJ-NP-Z1-9]{25,34}").unwrap();

    static ref LONG_ID_REGEX: Regex = Regex::new(r"\b[0-9]{12,}\b").unwrap();

    static ref PLACEHOLDER_REGEX: Regex =
        Regex::new(r"\[(?:email|phone|wallet|id):[0-9a-f]{8}\]").unwrap();
}

/// Identifier classes, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Email,
    Phone,
    Wallet,
    LongId,
}

impl PatternKind {
    pub const ALL: [PatternKind; 4] = [
        PatternKind::Email,
        PatternKind::Phone,
        PatternKind::Wallet,
        PatternKind::LongId,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PatternKind::Email => "email",
            PatternKind::Phone => "phone",
            PatternKind::Wallet => "wallet",
            PatternKind::LongId => "id",
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            PatternKind::Email => &EMAIL_REGEX,
            PatternKind::Phone => &PHONE_REGEX,
            PatternKind::Wallet => &WALLET_REGEX,
            PatternKind::LongId => &LONG_ID_REGEX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    #[serde(rename = "match")]
    pub matched: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionResult {
    pub redacted: String,
    pub original: String,
    /// In encounter order, pass by pass.
    pub replaced: Vec<Replacement>,
}

impl RedactionResult {
    pub fn count(&self) -> usize {
        self.replaced.len()
    }
}

/// Mask emails, phone numbers, wallet addresses and long numeric ids.
///
/// Each pass runs on the previous pass's output. Matches overlapping an
/// existing placeholder are left alone, so redacting twice is a no-op.
pub fn redact(text: &str) -> RedactionResult {
    let mut replaced = Vec::new();
    let mut redacted = text.to_string();

    for kind in PatternKind::ALL {
        redacted = mask_pass(&redacted, kind, &mut replaced);
    }

    RedactionResult {
        redacted,
        original: text.to_string(),
        replaced,
    }
}

fn mask_pass(input: &str, kind: PatternKind, replaced: &mut Vec<Replacement>) -> String {
    let protected: Vec<(usize, usize)> = PLACEHOLDER_REGEX
        .find_iter(input)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for m in kind.regex().find_iter(input) {
        if protected
            .iter()
            .any(|&(start, end)| m.start() < end && start < m.end())
        {
            continue;
        }

        let replacement = placeholder(kind, m.as_str());
        out.push_str(&input[last..m.start()]);
        out.push_str(&replacement);
        last = m.end();

        replaced.push(Replacement {
            matched: m.as_str().to_string(),
            replacement,
        });
    }

    out.push_str(&input[last..]);
    out
}

fn placeholder(kind: PatternKind, matched: &str) -> String {
    format!("[{}:{}]", kind.label(), fingerprint(matched))
}

/// First 8 hex characters of the SHA-256 of `value`.
pub fn fingerprint(value: &str) -> String {
    let mut digest = hash_text(value);
    digest.truncate(8);
    digest
}

/// Full hex SHA-256, used as the content hash of a selection.
pub fn hash_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

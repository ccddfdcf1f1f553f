//! Customer phone numbers arrive from the chat channel and from the payment gateway in slightly different shapes
//! (`whatsapp:+254 700 000 001`, `254700000001`, `00254-700-000001`). Both sides must agree on one canonical form so
//! that payment matching by phone works, so every number is normalized to E.164 (`+<country><subscriber>`).
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const CHANNEL_PREFIXES: [&str; 2] = ["whatsapp:", "tel:"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid international phone number")]
pub struct InvalidPhoneNumber(pub String);

fn e164() -> &'static Regex {
    static E164: OnceLock<Regex> = OnceLock::new();
    E164.get_or_init(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("E.164 pattern is valid"))
}

/// Normalizes a customer phone number to E.164.
///
/// Channel prefixes and the separators people type (spaces, `-`, `.`, parentheses) are stripped. A leading `00`
/// international prefix becomes `+`, and a bare number starting with a non-zero digit is assumed to already carry its
/// country code. Numbers in national format (`0700…`) are rejected because the country cannot be inferred.
pub fn normalize_phone(raw: &str) -> Result<String, InvalidPhoneNumber> {
    let mut s = raw.trim();
    for prefix in CHANNEL_PREFIXES {
        if s.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix)) {
            s = &s[prefix.len()..];
        }
    }
    let compact: String = s.chars().filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '(' | ')')).collect();
    let candidate = if let Some(rest) = compact.strip_prefix("00") {
        format!("+{rest}")
    } else if compact.starts_with(|c: char| matches!(c, '1'..='9')) {
        format!("+{compact}")
    } else {
        compact
    };
    if e164().is_match(&candidate) {
        Ok(candidate)
    } else {
        Err(InvalidPhoneNumber(raw.to_string()))
    }
}

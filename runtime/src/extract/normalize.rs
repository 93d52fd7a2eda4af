//! Canonicalization of localized numeric text.
//!
//! Quote pages render numbers in European notation (`1.234,56`, `+1,26%`),
//! often wrapped in parentheses and padded with layout whitespace. The
//! cleaners extract the canonical token and degrade gracefully: a strict
//! pattern first, then a looser one, and finally the cleaned text itself, so
//! a non-empty input never comes back empty. All cleaners are idempotent.

use regex::Regex;
use std::sync::OnceLock;

/// Signed European decimal with optional thousands grouping: `-1.234,56`.
fn strict_absolute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-+]?\b\d{1,3}(?:\.\d{3})*,\d{2}\b").expect("absolute regex is valid")
    })
}

/// Any run of digits with `.`/`,` separators.
fn loose_absolute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-+]?\b\d+(?:[.,]\d+)*\b").expect("loose absolute regex is valid")
    })
}

/// Signed European percentage: `+1,26%`.
pub(crate) fn strict_percentage() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\b\d+,\d+%").expect("percentage regex is valid"))
}

/// Integer or decimal with either separator, optional space before `%`.
fn loose_percentage() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-+]?\b\d+(?:[.,]\d+)?\s?%").expect("loose percentage regex is valid")
    })
}

/// Collapse every whitespace run (including non-breaking spaces) to a
/// single space and trim the ends.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip enclosing parentheses (and the whitespace around them) until stable.
fn strip_enclosing(raw: &str) -> &str {
    let mut current = raw;
    loop {
        let next = current
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')');
        if next.len() == current.len() {
            return current;
        }
        current = next;
    }
}

fn clean_with(raw: &str, strict: &Regex, loose: &Regex) -> String {
    let cleaned = collapse_whitespace(strip_enclosing(raw));
    if cleaned.is_empty() {
        return collapse_whitespace(raw);
    }
    if let Some(m) = strict.find(&cleaned) {
        return m.as_str().to_string();
    }
    if let Some(m) = loose.find(&cleaned) {
        return m.as_str().to_string();
    }
    cleaned
}

/// Canonicalize an absolute value such as a price or a point change.
pub fn clean_absolute(raw: &str) -> String {
    clean_with(raw, strict_absolute(), loose_absolute())
}

/// Canonicalize a percentage change.
pub fn clean_percentage(raw: &str) -> String {
    clean_with(raw, strict_percentage(), loose_percentage())
}

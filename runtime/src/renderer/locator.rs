//! Element locators understood by every render context.
//!
//! A locator is a CSS selector with an optional `:has-text('…')` suffix that
//! narrows the match to elements whose rendered text contains the given
//! substring (e.g. `button:has-text('Accept')`). The suffix is resolved by the
//! renderer, not by the browser's selector engine.

use std::fmt;

const HAS_TEXT: &str = ":has-text(";

/// A parsed element locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    css: String,
    has_text: Option<String>,
}

impl Locator {
    /// Parse a locator string. Never fails: anything that is not a
    /// well-formed `:has-text(...)` suffix is kept as plain CSS and left for
    /// the browser to reject.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some((css, needle)) = split_has_text(raw) {
            return Self {
                raw: raw.to_string(),
                css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                has_text: Some(needle.to_string()),
            };
        }
        Self {
            raw: raw.to_string(),
            css: raw.to_string(),
            has_text: None,
        }
    }

    /// The CSS part handed to `querySelectorAll`.
    pub fn css(&self) -> &str {
        &self.css
    }

    /// Required text substring, if any.
    pub fn has_text(&self) -> Option<&str> {
        self.has_text.as_deref()
    }

    /// The locator exactly as written in the rule table or manifest.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Locator {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Split `css:has-text('needle')` into `("css", "needle")`. Only a trailing
/// suffix with matching single or double quotes is recognized.
fn split_has_text(raw: &str) -> Option<(&str, &str)> {
    let start = raw.rfind(HAS_TEXT)?;
    let inner = raw[start + HAS_TEXT.len()..].strip_suffix(')')?;
    let needle = ['\'', '"'].iter().find_map(|q| {
        inner
            .strip_prefix(*q)
            .and_then(|rest| rest.strip_suffix(*q))
    })?;
    Some((raw[..start].trim_end(), needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_css() {
        let loc = Locator::parse("  span.text-2xl ");
        assert_eq!(loc.css(), "span.text-2xl");
        assert_eq!(loc.has_text(), None);
        assert_eq!(loc.as_str(), "span.text-2xl");
    }

    #[test]
    fn test_has_text_single_quotes() {
        let loc = Locator::parse("button:has-text('Accetta')");
        assert_eq!(loc.css(), "button");
        assert_eq!(loc.has_text(), Some("Accetta"));
        assert_eq!(loc.to_string(), "button:has-text('Accetta')");
    }

    #[test]
    fn test_has_text_double_quotes_and_bare() {
        let loc = Locator::parse(r#":has-text("I agree")"#);
        assert_eq!(loc.css(), "*");
        assert_eq!(loc.has_text(), Some("I agree"));
    }

    #[test]
    fn test_malformed_suffix_stays_css() {
        let loc = Locator::parse("button:has-text(Accept)");
        assert_eq!(loc.css(), "button:has-text(Accept)");
        assert_eq!(loc.has_text(), None);
    }

    #[test]
    fn test_attribute_selector_untouched() {
        let loc = Locator::parse("[data-test='instrument-price-last']");
        assert_eq!(loc.css(), "[data-test='instrument-price-last']");
        assert!(loc.has_text().is_none());
    }
}

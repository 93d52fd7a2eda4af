//! Last-resort scan of the rendered page text.
//!
//! Only consulted after the selector cascade and the URL fragment came up
//! empty. The text read is capped so a pathological page cannot make the scan
//! expensive.

use crate::renderer::RenderContext;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Default cap on the number of characters read from the page body.
pub const DEFAULT_SCAN_LIMIT: usize = 200_000;

fn percentage_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d+,\d+%").expect("percentage regex is valid"))
}

fn price_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d{1,3}(?:\.\d{3})*,\d{2}\b").expect("price regex is valid")
    })
}

/// Read at most `limit` characters of body text. A failed read is an empty
/// body, never an error.
pub async fn read_body(ctx: &dyn RenderContext, limit: usize) -> String {
    match ctx.body_text(limit).await {
        Ok(text) => text,
        Err(e) => {
            debug!("body text unavailable: {e}");
            String::new()
        }
    }
}

/// First signed percentage token in `text`, or empty.
pub fn find_percentage(text: &str) -> String {
    percentage_pattern()
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// First European-format price token in `text`, or empty.
pub fn find_price(text: &str) -> String {
    price_pattern()
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Read the bounded body text and return its first percentage token.
pub async fn scan_body_for_percentage(ctx: &dyn RenderContext, limit: usize) -> String {
    find_percentage(&read_body(ctx, limit).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_percentage_first_match() {
        let text = "FTSE MIB 34.512,40 +120,50 (+0,35%)\nDAX -0,12%";
        assert_eq!(find_percentage(text), "+0,35%");
    }

    #[test]
    fn test_find_percentage_none() {
        assert_eq!(find_percentage("Price 12.50 change 1.2%"), "");
    }

    #[test]
    fn test_find_price_word_bounded() {
        assert_eq!(find_price("Ultimo 1.234,56 EUR"), "1.234,56");
        assert_eq!(find_price("id 12345,678"), "");
    }
}

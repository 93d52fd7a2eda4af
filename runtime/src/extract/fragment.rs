//! Quote values encoded in a URL fragment.
//!
//! Shared "current price" deep links (browser text fragments such as
//! `#:~:text=158%2C75…(%2B1%2C01%25)`) carry the quote that was on screen
//! when the link was made. Checking them costs nothing and cannot fail the
//! task, so the orchestrator consults them before scanning the page body.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Values recovered from a fragment. Empty strings mean "no match".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentValues {
    pub price: String,
    pub change_pct: String,
}

fn price_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,3}(?:\.\d{3})*,\d{2}").expect("price regex is valid"))
}

fn percentage_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([-+]?\d+,\d+%)\)").expect("percentage regex is valid"))
}

/// The raw (still percent-encoded) fragment of `url`, if any.
fn raw_fragment(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed.fragment().map(str::to_string),
        Err(_) => url.split_once('#').map(|(_, frag)| frag.to_string()),
    }
}

/// Extract a price and a parenthesized percentage change from the fragment
/// of `url`. Missing fragment or no match yields empty strings.
pub fn extract_from_fragment(url: &str) -> FragmentValues {
    let mut out = FragmentValues::default();
    let Some(raw) = raw_fragment(url).filter(|f| !f.is_empty()) else {
        return out;
    };
    let decoded = urlencoding::decode(&raw)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| raw.clone());

    if let Some(m) = price_pattern().find(&decoded) {
        out.price = m.as_str().to_string();
    }
    if let Some(caps) = percentage_pattern().captures(&decoded) {
        out.change_pct = caps[1].to_string();
    }
    out
}

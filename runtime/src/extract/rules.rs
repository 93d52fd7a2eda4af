//! Domain rule table and candidate resolution.
//!
//! The rule table maps a normalized domain (lowercased host) to, per field,
//! an ordered list of locators. Order is priority: earlier entries are the
//! precise site-specific locators, later ones looser generic fallbacks. The
//! built-in table is embedded at compile time from `default_rules.json`; a
//! user file with the same shape may replace individual (domain, field)
//! lists. The table is immutable once built.

use super::Field;
use crate::renderer::Locator;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use url::Url;

/// Built-in rules, embedded so there is no runtime file I/O.
const DEFAULT_RULES_JSON: &str = include_str!("default_rules.json");

/// Raw rule file shape: `{ "<host>": { "<field>": ["locator", ...] } }`.
type RawRules = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Configured locators for one domain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DomainRuleSet {
    pub domain: String,
    pub field_candidates: BTreeMap<Field, Vec<String>>,
}

/// Per-item selector overrides taken from the input manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOverrides(BTreeMap<Field, String>);

impl FieldOverrides {
    /// Record an override; blank selectors are ignored.
    pub fn set(&mut self, field: Field, selector: &str) {
        let selector = selector.trim();
        if !selector.is_empty() {
            self.0.insert(field, selector.to_string());
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolved, priority-ordered locators for every field of one task.
#[derive(Debug, Clone, Default)]
pub struct FieldCandidates(BTreeMap<Field, Vec<Locator>>);

impl FieldCandidates {
    /// Candidates for `field`, highest priority first.
    pub fn get(&self, field: Field) -> &[Locator] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Immutable domain → rule set table.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    domains: HashMap<String, DomainRuleSet>,
}

impl RuleBook {
    /// The built-in rule table.
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_RULES_JSON).context("built-in rule table is malformed")
    }

    /// Parse a rule table from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawRules = serde_json::from_str(json).context("invalid rule JSON")?;
        let mut domains = HashMap::new();
        for (domain, fields) in raw {
            let domain = domain.trim().to_lowercase();
            let mut field_candidates = BTreeMap::new();
            for (key, locators) in fields {
                let Some(field) = Field::from_key(&key) else {
                    bail!("unknown field '{key}' for domain '{domain}'");
                };
                let locators: Vec<String> = locators
                    .into_iter()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect();
                field_candidates.insert(field, locators);
            }
            domains.insert(
                domain.clone(),
                DomainRuleSet {
                    domain,
                    field_candidates,
                },
            );
        }
        Ok(Self { domains })
    }

    /// Built-in table with an optional user rule file layered on top.
    pub fn load(user_rules: Option<&Path>) -> Result<Self> {
        let builtin = Self::builtin()?;
        match user_rules {
            None => Ok(builtin),
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read rule file: {}", path.display()))?;
                let user = Self::from_json(&json)
                    .with_context(|| format!("failed to parse rule file: {}", path.display()))?;
                Ok(builtin.merged_with(user))
            }
        }
    }

    /// Layer `other` over `self`: each (domain, field) list in `other`
    /// replaces the one in `self`.
    pub fn merged_with(mut self, other: RuleBook) -> Self {
        for (domain, rules) in other.domains {
            let entry = self
                .domains
                .entry(domain.clone())
                .or_insert_with(|| DomainRuleSet {
                    domain,
                    field_candidates: BTreeMap::new(),
                });
            entry.field_candidates.extend(rules.field_candidates);
        }
        self
    }

    pub fn domain(&self, domain: &str) -> Option<&DomainRuleSet> {
        self.domains.get(domain)
    }

    /// All rule sets, sorted by domain.
    pub fn domains(&self) -> Vec<&DomainRuleSet> {
        let mut all: Vec<_> = self.domains.values().collect();
        all.sort_by(|a, b| a.domain.cmp(&b.domain));
        all
    }

    /// Candidate locators for every field: the per-item override (if any)
    /// first, then the domain's configured list. Unknown domains yield
    /// override-only, possibly empty, lists.
    pub fn resolve(&self, domain: &str, overrides: &FieldOverrides) -> FieldCandidates {
        let rules = self.domains.get(domain);
        let mut resolved = BTreeMap::new();
        for field in Field::ALL {
            let mut candidates = Vec::new();
            if let Some(selector) = overrides.get(field) {
                candidates.push(Locator::parse(selector));
            }
            if let Some(list) = rules.and_then(|r| r.field_candidates.get(&field)) {
                candidates.extend(list.iter().map(|l| Locator::parse(l)));
            }
            resolved.insert(field, candidates);
        }
        FieldCandidates(resolved)
    }
}

/// Normalized domain of `url`: the lowercased host, or empty when the URL
/// has none.
pub fn normalize_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(candidates: &[Locator]) -> Vec<&str> {
        candidates.iter().map(Locator::as_str).collect()
    }

    #[test]
    fn test_builtin_rules_parse() {
        let book = RuleBook::builtin().unwrap();
        let rules = book.domain("it.investing.com").unwrap();
        assert_eq!(
            rules.field_candidates[&Field::Price][0],
            "[data-test='instrument-price-last']"
        );
    }

    #[test]
    fn test_override_prepended() {
        let book = RuleBook::builtin().unwrap();
        let mut overrides = FieldOverrides::default();
        overrides.set(Field::Price, " #last ");
        let resolved = book.resolve("it.investing.com", &overrides);
        let price = strings(resolved.get(Field::Price));
        assert_eq!(price[0], "#last");
        assert_eq!(price[1], "[data-test='instrument-price-last']");
        // Fields without an override keep the domain list untouched.
        assert_eq!(strings(resolved.get(Field::Name))[0], "h1");
    }

    #[test]
    fn test_unknown_domain_override_only() {
        let book = RuleBook::builtin().unwrap();
        let mut overrides = FieldOverrides::default();
        overrides.set(Field::ChangePct, ".pct");
        overrides.set(Field::Name, "   ");
        let resolved = book.resolve("quotes.example.org", &overrides);
        assert_eq!(strings(resolved.get(Field::ChangePct)), vec![".pct"]);
        assert!(resolved.get(Field::Name).is_empty());
        assert!(resolved.get(Field::Price).is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RuleBook::from_json(r#"{"a.com": {"volume": ["x"]}}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field 'volume'"));
    }

    #[test]
    fn test_merge_replaces_per_field() {
        let user = RuleBook::from_json(
            r#"{"IT.investing.com": {"price": ["span.new-price"]}, "borsa.example": {"name": ["h2"]}}"#,
        )
        .unwrap();
        let book = RuleBook::builtin().unwrap().merged_with(user);
        let it = book.domain("it.investing.com").unwrap();
        assert_eq!(it.field_candidates[&Field::Price], vec!["span.new-price"]);
        assert_eq!(it.field_candidates[&Field::Name][0], "h1");
        assert!(book.domain("borsa.example").is_some());
        assert_eq!(book.domains().len(), 3);
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(
            normalize_domain("https://IT.Investing.com:443/indices/it-mib-40"),
            "it.investing.com"
        );
        assert_eq!(normalize_domain("not a url"), "");
    }
}

//! `quoteshot rules` — print the effective extraction rule table.

use crate::cli::output::{self, Styled};
use crate::extract::rules::{DomainRuleSet, RuleBook};
use anyhow::{bail, Result};
use std::path::Path;

/// Run the rules command.
pub async fn run(rules_path: Option<&Path>, domain: Option<&str>) -> Result<()> {
    let book = RuleBook::load(rules_path)?;

    let selected: Vec<&DomainRuleSet> = match domain {
        Some(d) => {
            let d = d.trim().to_lowercase();
            match book.domain(&d) {
                Some(rules) => vec![rules],
                None => bail!("no rules configured for '{d}'"),
            }
        }
        None => book.domains(),
    };

    if output::is_json() {
        output::print_json(&selected);
        return Ok(());
    }

    let s = Styled::new();
    for rules in selected {
        println!("{}", s.bold(&rules.domain));
        for (field, locators) in &rules.field_candidates {
            println!("  {field}");
            for (i, locator) in locators.iter().enumerate() {
                println!("    {}. {locator}", i + 1);
            }
        }
        println!();
    }
    Ok(())
}

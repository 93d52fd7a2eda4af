//! Aggregate outputs: `quotes.csv` and `quotes.json`.

use super::{BatchError, ResourceResult};
use crate::extract::{Field, SourceTier};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const CSV_FILE: &str = "quotes.csv";
pub const JSON_FILE: &str = "quotes.json";

const CSV_HEADER: [&str; 10] = [
    "source",
    "url",
    "name",
    "price",
    "change_abs",
    "change_pct",
    "quote_time",
    "captured_at_local",
    "screenshot",
    "navigation_error",
];

/// One output record per result.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteRecord {
    pub source: String,
    pub url: String,
    pub name: String,
    pub price: String,
    pub change_abs: String,
    pub change_pct: String,
    pub quote_time: String,
    pub captured_at_local: String,
    pub screenshot: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_error: Option<String>,
    /// Which strategy produced each field; every field is listed.
    pub provenance: BTreeMap<Field, SourceTier>,
}

impl From<&ResourceResult> for QuoteRecord {
    fn from(result: &ResourceResult) -> Self {
        let screenshot = result
            .screenshot_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source: result.domain.clone(),
            url: result.url.clone(),
            name: result.value(Field::Name).to_string(),
            price: result.value(Field::Price).to_string(),
            change_abs: result.value(Field::ChangeAbs).to_string(),
            change_pct: result.value(Field::ChangePct).to_string(),
            quote_time: result.value(Field::QuoteTime).to_string(),
            captured_at_local: result.captured_at_local.clone(),
            screenshot,
            navigation_error: result.navigation_error.clone(),
            provenance: Field::ALL
                .into_iter()
                .map(|field| {
                    let tier = result
                        .fields
                        .get(&field)
                        .map_or(SourceTier::None, |r| r.source_tier);
                    (field, tier)
                })
                .collect(),
        }
    }
}

/// Write `quotes.csv` and `quotes.json` into `dir`.
pub fn write_reports(dir: &Path, results: &[ResourceResult]) -> Result<(), BatchError> {
    let records: Vec<QuoteRecord> = results.iter().map(QuoteRecord::from).collect();
    write_csv(&dir.join(CSV_FILE), &records)?;
    write_json(&dir.join(JSON_FILE), &records)?;
    Ok(())
}

fn write_csv(path: &Path, records: &[QuoteRecord]) -> Result<(), BatchError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;
    for r in records {
        writer.write_record([
            r.source.as_str(),
            r.url.as_str(),
            r.name.as_str(),
            r.price.as_str(),
            r.change_abs.as_str(),
            r.change_pct.as_str(),
            r.quote_time.as_str(),
            r.captured_at_local.as_str(),
            r.screenshot.as_str(),
            r.navigation_error.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(path: &Path, records: &[QuoteRecord]) -> Result<(), BatchError> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    Ok(())
}

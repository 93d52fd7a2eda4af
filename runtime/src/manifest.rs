//! Input manifest parsing.
//!
//! Two formats are accepted:
//! - a delimited table (`.csv` comma, `.tsv` tab) with a `url` column and
//!   optional per-field selector override columns;
//! - anything else as a plain list, one URL per line, with blank lines and
//!   `#` comments ignored.

use crate::extract::rules::FieldOverrides;
use crate::extract::Field;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

/// One resource to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTask {
    pub url: String,
    pub overrides: FieldOverrides,
}

impl ExtractionTask {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            overrides: FieldOverrides::default(),
        }
    }
}

/// Map a table header to what it carries.
enum Column {
    Url,
    Override(Field),
    Ignored,
}

fn classify_header(header: &str) -> Column {
    match header.trim().to_lowercase().as_str() {
        "url" | "link" => Column::Url,
        "name_sel" => Column::Override(Field::Name),
        "price_sel" => Column::Override(Field::Price),
        "change_abs_sel" => Column::Override(Field::ChangeAbs),
        "change_pct_sel" | "change_sel" => Column::Override(Field::ChangePct),
        "quote_time_sel" | "datetime_sel" => Column::Override(Field::QuoteTime),
        _ => Column::Ignored,
    }
}

/// Load tasks from `path`, choosing the format by extension.
pub fn load(path: &Path) -> Result<Vec<ExtractionTask>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input manifest: {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("csv") => parse_table(&content, b','),
        Some("tsv") => parse_table(&content, b'\t'),
        _ => Ok(parse_url_list(&content)),
    }
}

/// Plain-text manifest: one URL per line.
pub fn parse_url_list(content: &str) -> Vec<ExtractionTask> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ExtractionTask::new)
        .collect()
}

/// Delimited manifest with a header row. A table without a URL column
/// yields no tasks rather than an error.
pub fn parse_table(content: &str, delimiter: u8) -> Result<Vec<ExtractionTask>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let columns: Vec<Column> = reader
        .headers()
        .context("failed to read manifest header")?
        .iter()
        .map(classify_header)
        .collect();
    if !columns.iter().any(|c| matches!(c, Column::Url)) {
        warn!("manifest has no 'url' column, no rows can be used");
        return Ok(Vec::new());
    }

    let mut tasks = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed manifest row {}", row_idx + 2))?;
        let mut url = String::new();
        let mut overrides = FieldOverrides::default();
        for (column, value) in columns.iter().zip(record.iter()) {
            match column {
                Column::Url if url.is_empty() => url = value.trim().to_string(),
                Column::Override(field) => overrides.set(*field, value),
                _ => {}
            }
        }
        if url.is_empty() {
            warn!("manifest row {} has no URL, skipping", row_idx + 2);
            continue;
        }
        tasks.push(ExtractionTask { url, overrides });
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_url_list_skips_comments_and_blanks() {
        let tasks = parse_url_list("# watchlist\n\nhttps://a.example/x\n  https://b.example/y  \n#https://c\n");
        let urls: Vec<_> = tasks.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/x", "https://b.example/y"]);
        assert!(tasks[0].overrides.is_empty());
    }

    #[test]
    fn test_table_with_overrides() {
        let csv = "url,name_sel,price_sel,change_abs_sel,change_pct_sel\n\
                   https://a.example/x,h1.title,#last,,span.pct\n\
                   https://b.example/y,,,,\n";
        let tasks = parse_table(csv, b',').unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].overrides.get(Field::Name), Some("h1.title"));
        assert_eq!(tasks[0].overrides.get(Field::Price), Some("#last"));
        assert_eq!(tasks[0].overrides.get(Field::ChangeAbs), None);
        assert_eq!(tasks[0].overrides.get(Field::ChangePct), Some("span.pct"));
        assert!(tasks[1].overrides.is_empty());
    }

    #[test]
    fn test_table_legacy_columns_and_case() {
        let csv = "URL,change_sel,datetime_sel\nhttps://a.example,.chg,time\n";
        let tasks = parse_table(csv, b',').unwrap();
        assert_eq!(tasks[0].url, "https://a.example");
        assert_eq!(tasks[0].overrides.get(Field::ChangePct), Some(".chg"));
        assert_eq!(tasks[0].overrides.get(Field::QuoteTime), Some("time"));
    }

    #[test]
    fn test_table_skips_rows_without_url() {
        let csv = "url,price_sel\n,#p\nhttps://a.example,\n";
        let tasks = parse_table(csv, b',').unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].url, "https://a.example");
    }

    #[test]
    fn test_table_without_url_column_is_empty() {
        let tasks = parse_table("address,price_sel\nx,y\n", b',').unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("urls.tsv");
        std::fs::File::create(&tsv)
            .unwrap()
            .write_all(b"link\tprice_sel\nhttps://a.example\t.p\n")
            .unwrap();
        let tasks = load(&tsv).unwrap();
        assert_eq!(tasks[0].overrides.get(Field::Price), Some(".p"));

        let txt = dir.path().join("urls.txt");
        std::fs::write(&txt, "https://a.example\n").unwrap();
        assert_eq!(load(&txt).unwrap().len(), 1);

        assert!(load(&dir.path().join("missing.txt")).is_err());
    }
}

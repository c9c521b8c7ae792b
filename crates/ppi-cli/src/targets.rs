//! Target CSV loading.
//!
//! The first row is the header. Every column of a row becomes a URL template
//! variable; `retailer_id` (or its older spellings `retail_id` / `retail`) and
//! `product_id` pick the retailer and product.

use std::collections::BTreeMap;
use std::mem::take;
use std::path::Path;

use ppi_scraper::LookupContext;

const RETAILER_COLUMNS: [&str; 3] = ["retailer_id", "retail_id", "retail"];

/// One row of the targets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    /// 1-based line of the row in the source file (header is line 1).
    pub line: usize,
    pub retailer_id: Option<String>,
    pub product_id: Option<String>,
    pub columns: BTreeMap<String, String>,
}

impl Target {
    pub(crate) fn context(&self) -> LookupContext {
        LookupContext {
            product_id: self.product_id.clone().unwrap_or_default(),
            vars: self.columns.clone(),
        }
    }
}

/// Reads and parses the targets file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has no header row.
pub(crate) fn load_targets(path: &Path) -> anyhow::Result<Vec<Target>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("failed to read targets file {}: {e}", path.display())
    })?;
    parse_targets(&text)
}

pub(crate) fn parse_targets(text: &str) -> anyhow::Result<Vec<Target>> {
    let mut rows = parse_rows(text.trim_start_matches('\u{feff}')).into_iter();
    let Some(header) = rows.next() else {
        anyhow::bail!("targets file has no header row");
    };
    let header: Vec<String> = header.iter().map(|h| h.trim().to_owned()).collect();

    let targets = rows
        .enumerate()
        .map(|(i, row)| {
            let columns: BTreeMap<String, String> = header
                .iter()
                .zip(row)
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.clone(), value.trim().to_owned()))
                .collect();
            let non_empty = |key: &str| columns.get(key).filter(|v| !v.is_empty()).cloned();

            Target {
                line: i + 2,
                retailer_id: RETAILER_COLUMNS.into_iter().find_map(&non_empty),
                product_id: non_empty("product_id"),
                columns,
            }
        })
        .collect();
    Ok(targets)
}

/// Splits CSV text into rows of fields. Handles quoted fields, doubled-quote
/// escapes, and CRLF line endings; blank lines are skipped.
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if row.len() == 1 && row[0].is_empty() {
                    row.clear();
                } else {
                    rows.push(take(&mut row));
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

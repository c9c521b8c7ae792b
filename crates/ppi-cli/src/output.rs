//! Result CSV writing.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use ppi_core::{DISCOUNT_FIELD, FINAL_PRICE_FIELD, UNIT_PRICE_FIELD};
use ppi_scraper::{normalize_price_text, Lookup, LookupFailure};

pub(crate) const OUTPUT_FIELDS: [&str; 11] = [
    "retailer_id",
    "product_id",
    "url",
    "collected_at",
    "http_status",
    "final_price",
    "discount",
    "discount_flag",
    "unit_price_text",
    "tries",
    "error",
];

/// Marker written to `error` for hard and soft 404s.
pub(crate) const NOT_FOUND: &str = "NOT_FOUND";

/// One line of the result file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct OutputRow {
    pub retailer_id: Option<String>,
    pub product_id: Option<String>,
    pub url: Option<String>,
    pub collected_at: Option<String>,
    pub http_status: Option<u16>,
    pub final_price: Option<String>,
    pub discount: Option<String>,
    pub discount_flag: bool,
    pub unit_price_text: Option<String>,
    pub tries: Option<u32>,
    pub error: Option<String>,
}

impl OutputRow {
    pub(crate) fn new(retailer_id: Option<String>, product_id: Option<String>) -> Self {
        Self {
            retailer_id,
            product_id,
            ..Self::default()
        }
    }

    pub(crate) fn with_lookup(self, lookup: &Lookup, collected_at: DateTime<Utc>) -> Self {
        let result = &lookup.result;
        let discount = result.value(DISCOUNT_FIELD).map(str::to_owned);
        Self {
            url: lookup.url.clone(),
            collected_at: Some(collected_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            http_status: lookup.http_status,
            final_price: normalize_price_text(result.value(FINAL_PRICE_FIELD)),
            discount_flag: discount.is_some(),
            discount,
            unit_price_text: result.value(UNIT_PRICE_FIELD).map(str::to_owned),
            tries: Some(result.tries),
            ..self
        }
    }

    pub(crate) fn with_failure(self, failure: &LookupFailure) -> Self {
        let error = if failure.error.is_not_found() {
            NOT_FOUND.to_owned()
        } else {
            failure.error.to_string()
        };
        Self {
            url: failure.url.clone(),
            http_status: failure.http_status,
            tries: Some(failure.tries),
            error: Some(error),
            ..self
        }
    }

    pub(crate) fn with_error(self, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..self
        }
    }

    fn cells(&self) -> Vec<String> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            text(&self.retailer_id),
            text(&self.product_id),
            text(&self.url),
            text(&self.collected_at),
            self.http_status.map(|s| s.to_string()).unwrap_or_default(),
            text(&self.final_price),
            text(&self.discount),
            self.discount_flag.to_string(),
            text(&self.unit_price_text),
            self.tries.map(|t| t.to_string()).unwrap_or_default(),
            text(&self.error),
        ]
    }
}

/// CSV sink that writes the header on creation and one line per row.
pub(crate) struct CsvWriter<W: Write> {
    inner: W,
}

impl<W: Write> CsvWriter<W> {
    pub(crate) fn new(mut inner: W) -> io::Result<Self> {
        let header: Vec<String> = OUTPUT_FIELDS.iter().map(|f| (*f).to_owned()).collect();
        write_record(&mut inner, &header)?;
        Ok(Self { inner })
    }

    pub(crate) fn write_row(&mut self, row: &OutputRow) -> io::Result<()> {
        write_record(&mut self.inner, &row.cells())?;
        self.inner.flush()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

/// Creates the output file (and its parent directories).
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub(crate) fn create_output(path: &Path) -> anyhow::Result<CsvWriter<BufWriter<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("failed to create output directory {}: {e}", parent.display())
        })?;
    }
    let file = File::create(path)
        .map_err(|e| anyhow::anyhow!("failed to create output file {}: {e}", path.display()))?;
    Ok(CsvWriter::new(BufWriter::new(file))?)
}

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

fn write_record<W: Write>(w: &mut W, cells: &[String]) -> io::Result<()> {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}

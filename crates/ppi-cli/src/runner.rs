//! Run orchestration.
//!
//! Each target gets a fresh page and one interpreter run. Lookups run with
//! bounded concurrency but rows are written in target order. Per-target
//! failures become error rows; they never abort the run.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use ppi_core::{ConfigError, RetailersFile, FINAL_PRICE_FIELD};
use ppi_scraper::{FlowError, FlowInterpreter, Page, PageSnapshot};
use tokio_util::sync::CancellationToken;

use crate::output::{CsvWriter, OutputRow, NOT_FOUND};
use crate::targets::Target;

#[derive(Debug, Clone, Default)]
pub(crate) struct RunSettings {
    pub concurrency: usize,
    /// Only process targets of this retailer.
    pub retailer_filter: Option<String>,
    /// Where to save the last document of failed lookups.
    pub debug_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub rows: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, row: &OutputRow) {
        self.rows += 1;
        match row.error.as_deref() {
            None => self.succeeded += 1,
            Some(NOT_FOUND) => self.not_found += 1,
            Some(_) => self.failed += 1,
        }
    }
}

/// Builds one interpreter per configured retailer.
///
/// # Errors
///
/// Returns the first retailer's `ConfigError`; a bad config aborts the run
/// before any target is processed.
pub(crate) fn build_interpreters(
    file: &RetailersFile,
    retry_delay: Duration,
) -> Result<BTreeMap<String, FlowInterpreter>, ConfigError> {
    file.retailers
        .iter()
        .map(|(id, config)| {
            let interpreter = FlowInterpreter::new(id, config)?.with_retry_delay(retry_delay);
            Ok((id.clone(), interpreter))
        })
        .collect()
}

/// Runs every selected target and writes one row per target.
///
/// Once `cancel` fires no new lookups start; in-flight ones finish with a
/// cancellation error row.
///
/// # Errors
///
/// Returns an error only if writing the output fails.
pub(crate) async fn run_targets<W, P, F>(
    targets: &[Target],
    interpreters: &BTreeMap<String, FlowInterpreter>,
    new_page: F,
    writer: &mut CsvWriter<W>,
    settings: &RunSettings,
    cancel: &CancellationToken,
) -> anyhow::Result<RunSummary>
where
    W: Write,
    P: Page,
    F: Fn() -> P,
{
    let selected = targets
        .iter()
        .filter(|t| match settings.retailer_filter.as_deref() {
            Some(filter) => t.retailer_id.as_deref() == Some(filter),
            None => true,
        });

    let mut rows = std::pin::pin!(stream::iter(selected)
        .take_while(|_| std::future::ready(!cancel.is_cancelled()))
        .map(|target| process_target(target, interpreters, new_page(), settings, cancel))
        .buffered(settings.concurrency.max(1)));

    let mut summary = RunSummary::default();
    while let Some(row) = rows.next().await {
        writer.write_row(&row)?;
        summary.record(&row);
    }
    Ok(summary)
}

async fn process_target<P: Page>(
    target: &Target,
    interpreters: &BTreeMap<String, FlowInterpreter>,
    mut page: P,
    settings: &RunSettings,
    cancel: &CancellationToken,
) -> OutputRow {
    let row = OutputRow::new(target.retailer_id.clone(), target.product_id.clone());

    let Some(retailer_id) = target.retailer_id.as_deref() else {
        tracing::warn!(line = target.line, "target row has no retailer_id");
        return row.with_error("Missing retailer_id in targets row");
    };
    let Some(interpreter) = interpreters.get(retailer_id) else {
        tracing::warn!(line = target.line, retailer = retailer_id, "retailer not in config");
        return row.with_error(format!("Retailer '{retailer_id}' not found in config"));
    };
    let Some(product_id) = target.product_id.as_deref() else {
        tracing::warn!(line = target.line, retailer = retailer_id, "target row has no product_id");
        return row.with_error("Missing product_id in targets row");
    };

    match interpreter.run(&mut page, &target.context(), cancel).await {
        Ok(lookup) => {
            tracing::info!(
                retailer = retailer_id,
                product_id,
                tries = lookup.result.tries,
                final_price = ?lookup.result.value(FINAL_PRICE_FIELD),
                "lookup succeeded"
            );
            row.with_lookup(&lookup, Utc::now())
        }
        Err(failure) if failure.error.is_not_found() => {
            tracing::info!(
                retailer = retailer_id,
                product_id,
                reason = %failure.error,
                "product not found"
            );
            row.with_failure(&failure)
        }
        Err(failure) => {
            tracing::warn!(
                retailer = retailer_id,
                product_id,
                tries = failure.tries,
                error = %failure.error,
                "lookup failed"
            );
            if !matches!(failure.error, FlowError::Cancelled) {
                if let Some(dir) = settings.debug_dir.as_deref() {
                    dump_page(dir, retailer_id, product_id, &page).await;
                }
            }
            row.with_failure(&failure)
        }
    }
}

/// Best-effort save of the failed page's markup.
async fn dump_page<S>(dir: &Path, retailer_id: &str, product_id: &str, page: &S)
where
    S: PageSnapshot + ?Sized,
{
    let Some(html) = page.content() else {
        return;
    };
    let path = dir.join(dump_file_name(retailer_id, product_id));
    match write_dump(dir, &path, html).await {
        Ok(()) => tracing::info!(path = %path.display(), "saved page dump"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to save page dump"),
    }
}

async fn write_dump(dir: &Path, path: &Path, html: String) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, html).await
}

pub(crate) fn dump_file_name(retailer_id: &str, product_id: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    };
    format!("{}_{}_last.html", clean(retailer_id), clean(product_id))
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;

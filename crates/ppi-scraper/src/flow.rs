//! Retailer flow interpreter.
//!
//! A [`FlowInterpreter`] is built once per retailer from its configuration
//! (validated and normalized to the canonical action form) and then run once
//! per product. Each run executes the flow's actions in order against a
//! [`Page`]. An attempt failure (navigation error, wait timeout, unresolved
//! required field) restarts the flow from its first `goto` until the `retry`
//! budget is used up.
//!
//! ```text
//! Idle → Navigating → Waiting → Extracting → Done
//!            ↑                      │
//!            └────── Retrying ←─────┘ (attempt failed, budget left)
//!                                   └→ Failed
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use ppi_core::{
    normalize_flow, validate_retailer, ConfigError, FlowAction, RetailerConfig, WaitUntil,
};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::error::{FlowError, LookupFailure, PageError};
use crate::extract::{extract_fields, ExtractionResult, FieldValue};
use crate::page::{Navigation, Page, PageSnapshot, WaitOutcome};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex")
});

/// Upper bound for the pause between two attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Navigating,
    Waiting,
    Extracting,
    Retrying,
    Done,
    Failed,
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlowState::Idle => "idle",
            FlowState::Navigating => "navigating",
            FlowState::Waiting => "waiting",
            FlowState::Extracting => "extracting",
            FlowState::Retrying => "retrying",
            FlowState::Done => "done",
            FlowState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Template variables for one product lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupContext {
    pub product_id: String,
    /// Extra `{name}` variables, e.g. the other columns of a targets row.
    pub vars: BTreeMap<String, String>,
}

impl LookupContext {
    #[must_use]
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            vars: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        if key == "product_id" {
            Some(&self.product_id)
        } else {
            self.vars.get(key).map(String::as_str)
        }
    }
}

/// Substitutes `{base_url}`, `{product_id}` and any context variable into a
/// `goto` URL template.
///
/// # Errors
///
/// Returns [`FlowError::UrlTemplate`] for a placeholder with no value.
pub fn render_url(template: &str, base_url: &str, ctx: &LookupContext) -> Result<String, FlowError> {
    let mut out = String::with_capacity(template.len() + base_url.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = match name.as_str() {
            "base_url" => base_url,
            key => ctx.get(key).ok_or_else(|| FlowError::UrlTemplate {
                template: template.to_owned(),
                placeholder: key.to_owned(),
            })?,
        };
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Successful product lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub retailer: String,
    /// Rendered URL of the first `goto`, if the flow has one.
    pub url: Option<String>,
    pub http_status: Option<u16>,
    pub result: ExtractionResult,
}

/// Per-run bookkeeping. Never shared between runs.
struct Progress<'a> {
    retailer: &'a str,
    state: FlowState,
    url: Option<String>,
    http_status: Option<u16>,
}

impl<'a> Progress<'a> {
    fn new(retailer: &'a str) -> Self {
        Self {
            retailer,
            state: FlowState::Idle,
            url: None,
            http_status: None,
        }
    }

    fn transition(&mut self, next: FlowState) {
        if self.state != next {
            tracing::debug!(
                retailer = self.retailer,
                from = %self.state,
                to = %next,
                "flow state transition"
            );
            self.state = next;
        }
    }
}

/// Interprets one retailer's canonical flow.
#[derive(Debug, Clone)]
pub struct FlowInterpreter {
    retailer: String,
    base_url: String,
    goto_wait_until: WaitUntil,
    goto_timeout: Duration,
    not_found_selectors: Vec<String>,
    flow: Vec<FlowAction>,
    retry_limit: u32,
    /// Index of the first `goto`; later attempts start here.
    restart_at: usize,
    retry_delay: Duration,
}

impl FlowInterpreter {
    /// Validates and normalizes `config` into an interpreter.
    ///
    /// When the flow has several `retry` actions, the first one sets the
    /// attempt budget.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the retailer configuration is invalid.
    pub fn new(retailer: &str, config: &RetailerConfig) -> Result<Self, ConfigError> {
        validate_retailer(retailer, config)?;
        let flow = normalize_flow(retailer, config)?;

        let retry_limit = config.retry_limit();
        if config.retry_action_count() > 1 {
            tracing::warn!(
                retailer,
                limit = retry_limit,
                "multiple retry actions in flow; using the first"
            );
        }

        let restart_at = flow
            .iter()
            .position(|a| matches!(a, FlowAction::Goto { .. }))
            .unwrap_or(0);

        Ok(Self {
            retailer: retailer.to_owned(),
            base_url: config.base_url.clone(),
            goto_wait_until: config.goto_wait_until,
            goto_timeout: Duration::from_millis(config.goto_timeout_ms),
            not_found_selectors: config.not_found.any_selectors.clone(),
            flow,
            retry_limit,
            restart_at,
            retry_delay: Duration::ZERO,
        })
    }

    /// Base pause between attempts; doubles per attempt with ±25 % jitter.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn retailer(&self) -> &str {
        &self.retailer
    }

    #[must_use]
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// The canonical (normalized) flow.
    #[must_use]
    pub fn flow(&self) -> &[FlowAction] {
        &self.flow
    }

    /// Runs the flow for one product.
    ///
    /// Cancelling `cancel` aborts the current navigation or wait and fails the
    /// lookup with [`FlowError::Cancelled`] without further attempts.
    ///
    /// # Errors
    ///
    /// Returns [`LookupFailure`] once the retry budget is exhausted, or
    /// immediately for errors that retrying cannot fix.
    pub async fn run<P>(
        &self,
        page: &mut P,
        ctx: &LookupContext,
        cancel: &CancellationToken,
    ) -> Result<Lookup, LookupFailure>
    where
        P: Page + ?Sized,
    {
        let mut progress = Progress::new(&self.retailer);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let start = if attempt == 1 { 0 } else { self.restart_at };

            match self
                .run_attempt(page, ctx, cancel, start, &mut progress)
                .await
            {
                Ok(fields) => {
                    progress.transition(FlowState::Done);
                    return Ok(Lookup {
                        retailer: self.retailer.clone(),
                        url: progress.url,
                        http_status: progress.http_status,
                        result: ExtractionResult {
                            fields,
                            tries: attempt,
                        },
                    });
                }
                Err(error) if error.is_retriable() && attempt < self.retry_limit => {
                    progress.transition(FlowState::Retrying);
                    tracing::warn!(
                        retailer = %self.retailer,
                        product_id = %ctx.product_id,
                        attempt,
                        limit = self.retry_limit,
                        error = %error,
                        "attempt failed; restarting flow"
                    );
                    if let Err(error) = self.pause_before_retry(attempt, cancel).await {
                        return Err(self.fail(error, attempt, progress));
                    }
                }
                Err(error) => return Err(self.fail(error, attempt, progress)),
            }
        }
    }

    async fn run_attempt<P>(
        &self,
        page: &mut P,
        ctx: &LookupContext,
        cancel: &CancellationToken,
        start: usize,
        progress: &mut Progress<'_>,
    ) -> Result<BTreeMap<String, FieldValue>, FlowError>
    where
        P: Page + ?Sized,
    {
        let mut fields = BTreeMap::new();
        let mut extracted = false;

        for action in &self.flow[start..] {
            match action {
                FlowAction::Goto { url } => {
                    progress.transition(FlowState::Navigating);
                    let url = render_url(url, &self.base_url, ctx)?;
                    if progress.url.is_none() {
                        progress.url = Some(url.clone());
                    }
                    let navigation = self.navigate(page, &url, cancel).await?;
                    progress.http_status = navigation.status;
                    if navigation.status == Some(404) {
                        return Err(FlowError::NotFound {
                            reason: "HTTP 404".to_owned(),
                            http_status: Some(404),
                        });
                    }
                }
                FlowAction::Retry { .. } => {}
                FlowAction::WaitForSelector {
                    selector,
                    timeout_ms,
                    state,
                } => {
                    progress.transition(FlowState::Waiting);
                    let timeout = Duration::from_millis(*timeout_ms);
                    let outcome = cancellable(cancel, page.wait_for_selector(selector, timeout, *state))
                        .await?
                        .map_err(FlowError::Page)?;
                    if outcome == WaitOutcome::TimedOut {
                        self.check_not_found(&*page, progress.http_status)?;
                        return Err(FlowError::WaitTimeout {
                            selector: selector.clone(),
                            state: *state,
                            timeout_ms: *timeout_ms,
                        });
                    }
                }
                FlowAction::WaitForTimeout { timeout_ms } => {
                    progress.transition(FlowState::Waiting);
                    cancellable(
                        cancel,
                        page.wait_for_timeout(Duration::from_millis(*timeout_ms)),
                    )
                    .await?;
                }
                FlowAction::Extract { fields: specs } => {
                    progress.transition(FlowState::Extracting);
                    self.check_not_found(&*page, progress.http_status)?;
                    fields.extend(extract_fields(&self.retailer, specs, &*page)?);
                    extracted = true;
                }
            }
        }

        if !extracted {
            self.check_not_found(&*page, progress.http_status)?;
        }
        Ok(fields)
    }

    /// Navigates once; a `networkidle` timeout gets one more try with
    /// `domcontentloaded` within the same attempt, since some pages keep
    /// background connections open forever.
    async fn navigate<P>(
        &self,
        page: &mut P,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Navigation, FlowError>
    where
        P: Page + ?Sized,
    {
        let first = cancellable(
            cancel,
            page.navigate(url, self.goto_wait_until, self.goto_timeout),
        )
        .await?;

        let result = match first {
            Err(PageError::Timeout { .. }) if self.goto_wait_until == WaitUntil::NetworkIdle => {
                tracing::debug!(
                    retailer = %self.retailer,
                    url,
                    "networkidle navigation timed out; retrying with domcontentloaded"
                );
                cancellable(
                    cancel,
                    page.navigate(url, WaitUntil::DomContentLoaded, self.goto_timeout),
                )
                .await?
            }
            other => other,
        };

        result.map_err(|source| FlowError::Navigation {
            url: url.to_owned(),
            source,
        })
    }

    /// Soft-404 probe over `not_found.any_selectors`.
    fn check_not_found<S>(&self, page: &S, http_status: Option<u16>) -> Result<(), FlowError>
    where
        S: PageSnapshot + ?Sized,
    {
        for selector in &self.not_found_selectors {
            if page.query_selector(selector).map_err(FlowError::Page)?.is_some() {
                return Err(FlowError::NotFound {
                    reason: format!("Soft 404 / product not found (matched: {selector})"),
                    http_status,
                });
            }
        }
        Ok(())
    }

    async fn pause_before_retry(
        &self,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<(), FlowError> {
        if self.retry_delay.is_zero() {
            return Ok(());
        }
        let backoff = self
            .retry_delay
            .saturating_mul(1u32 << (attempt - 1).min(10))
            .min(MAX_RETRY_DELAY);
        let delay = backoff.mul_f64(rand::random::<f64>() * 0.5 + 0.75);
        cancellable(cancel, tokio::time::sleep(delay)).await
    }

    fn fail(&self, error: FlowError, tries: u32, mut progress: Progress<'_>) -> LookupFailure {
        progress.transition(FlowState::Failed);
        LookupFailure {
            retailer: self.retailer.clone(),
            error,
            tries,
            url: progress.url,
            http_status: progress.http_status,
        }
    }
}

/// Runs `fut` unless `cancel` fires first.
async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output, FlowError>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FlowError::Cancelled),
        output = fut => Ok(output),
    }
}

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;

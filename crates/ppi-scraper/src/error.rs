use ppi_core::{ConfigError, WaitState};
use thiserror::Error;

/// Errors reported by a page collaborator.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Why one attempt (or the whole lookup) of a retailer flow failed.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown placeholder '{{{placeholder}}}' in URL template \"{template}\"")]
    UrlTemplate {
        template: String,
        placeholder: String,
    },

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: PageError,
    },

    #[error("wait_for_selector \"{selector}\" ({state}) timed out after {timeout_ms}ms")]
    WaitTimeout {
        selector: String,
        state: WaitState,
        timeout_ms: u64,
    },

    #[error(
        "Retailer '{retailer}' required field '{field}' not found (selectors: {})",
        format_selectors(.selectors)
    )]
    MissingField {
        retailer: String,
        field: String,
        selectors: Vec<String>,
    },

    #[error("{reason}")]
    NotFound {
        reason: String,
        http_status: Option<u16>,
    },

    #[error("page query failed: {0}")]
    Page(#[source] PageError),

    #[error("lookup cancelled")]
    Cancelled,
}

impl FlowError {
    /// Returns `true` for attempt failures that the `retry` budget may recover.
    ///
    /// Retriable:
    /// - [`FlowError::Navigation`]: transport error or navigation timeout.
    /// - [`FlowError::WaitTimeout`]
    /// - [`FlowError::MissingField`]: a required field did not resolve.
    /// - [`FlowError::Page`], except invalid selectors.
    ///
    /// Everything else (config problems, not-found pages, cancellation) is final.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            FlowError::Navigation { .. }
            | FlowError::WaitTimeout { .. }
            | FlowError::MissingField { .. } => true,
            FlowError::Page(e) => !matches!(e, PageError::InvalidSelector { .. }),
            FlowError::Config(_)
            | FlowError::UrlTemplate { .. }
            | FlowError::NotFound { .. }
            | FlowError::Cancelled => false,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowError::NotFound { .. })
    }
}

/// Renders `['.a', '.b']`.
fn format_selectors(selectors: &[String]) -> String {
    let quoted: Vec<String> = selectors.iter().map(|s| format!("'{s}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// A product lookup that did not produce a record.
#[derive(Debug, Error)]
#[error("lookup for retailer '{retailer}' failed after {tries} tries: {error}")]
pub struct LookupFailure {
    pub retailer: String,
    #[source]
    pub error: FlowError,
    pub tries: u32,
    /// Rendered URL of the first `goto`, when the flow got that far.
    pub url: Option<String>,
    pub http_status: Option<u16>,
}

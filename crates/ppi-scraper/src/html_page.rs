//! Static-HTML [`Page`] backed by `reqwest` and `scraper`.
//!
//! Fetches the document once per navigation and answers selector queries
//! against the parsed body. There is no script execution, so every wait
//! condition is evaluated against the document as served.

use std::time::Duration;

use async_trait::async_trait;
use ppi_core::{WaitState, WaitUntil};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::PageError;
use crate::page::{Navigation, NodeSnapshot, Page, PageSnapshot, WaitOutcome};

/// Builds the HTTP client shared by every [`HtmlPage`] of a run.
///
/// # Errors
///
/// Returns [`PageError::Http`] if the underlying `reqwest::Client`
/// cannot be constructed.
pub fn build_client(timeout_secs: u64, user_agent: &str) -> Result<Client, PageError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

pub struct HtmlPage {
    client: Client,
    /// Raw body of the last navigation. `scraper::Html` is not `Send`, so
    /// the body is re-parsed per query.
    body: Option<String>,
    status: Option<u16>,
}

impl HtmlPage {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            body: None,
            status: None,
        }
    }

    /// Loads `html` as the current document without fetching anything.
    #[must_use]
    pub fn with_document(mut self, html: impl Into<String>) -> Self {
        self.body = Some(html.into());
        self.status = Some(200);
        self
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl PageSnapshot for HtmlPage {
    fn query_selector(&self, selector: &str) -> Result<Option<NodeSnapshot>, PageError> {
        let parsed = Selector::parse(selector).map_err(|e| PageError::InvalidSelector {
            selector: selector.to_owned(),
            reason: format!("{e:?}"),
        })?;
        let Some(body) = self.body.as_deref() else {
            return Ok(None);
        };

        let document = Html::parse_document(body);
        Ok(document.select(&parsed).next().map(snapshot))
    }

    fn content(&self) -> Option<String> {
        self.body.clone()
    }
}

fn snapshot(element: ElementRef<'_>) -> NodeSnapshot {
    NodeSnapshot {
        text: element.text().collect(),
        attributes: element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect(),
        parent_text: element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| parent.text().collect()),
    }
}

#[async_trait]
impl Page for HtmlPage {
    /// `wait_until` has no meaning for a plain HTTP fetch: the document is
    /// complete once the body has been read.
    async fn navigate(
        &mut self,
        url: &str,
        _wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<Navigation, PageError> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                PageError::Timeout {
                    url: url.to_owned(),
                    timeout_ms,
                }
            } else {
                PageError::Http(e)
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(PageError::Navigation {
                url: url.to_owned(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response.text().await.map_err(map_err)?;
        tracing::debug!(url, status = status.as_u16(), bytes = body.len(), "page loaded");

        self.status = Some(status.as_u16());
        self.body = Some(body);
        Ok(Navigation {
            status: self.status,
        })
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
        state: WaitState,
    ) -> Result<WaitOutcome, PageError> {
        let present = self.query_selector(selector)?.is_some();
        Ok(if present == state.expects_presence() {
            WaitOutcome::Reached
        } else {
            WaitOutcome::TimedOut
        })
    }
}

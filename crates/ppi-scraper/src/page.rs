//! The page collaborator seam.
//!
//! The flow interpreter never talks to a browser or HTTP client directly. It
//! issues navigation and wait requests through [`Page`] and reads the current
//! document through [`PageSnapshot`]. [`crate::HtmlPage`] is the static-HTML
//! implementation; a browser-automation engine would plug in here too.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ppi_core::{WaitState, WaitUntil};

use crate::error::PageError;

/// First node matched by a selector query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Text content of the parent element, if the node has one.
    pub parent_text: Option<String>,
}

impl NodeSnapshot {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Navigation {
    /// HTTP status of the main document, when the engine exposes one.
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    TimedOut,
}

/// Read-only view of the current document.
pub trait PageSnapshot {
    /// Returns the first node matching `selector` (plain CSS, no `::` modifier).
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidSelector`] if the selector cannot be parsed.
    fn query_selector(&self, selector: &str) -> Result<Option<NodeSnapshot>, PageError>;

    /// Markup of the current document, for post-mortem dumps.
    fn content(&self) -> Option<String> {
        None
    }
}

/// Navigation and waiting capabilities of a page collaborator.
#[async_trait]
pub trait Page: PageSnapshot + Send {
    /// Load `url`, waiting for `wait_until` at most `timeout`.
    ///
    /// A client-error status such as 404 is not an error by itself; callers
    /// inspect [`Navigation::status`]. Implementations may report server
    /// errors as [`PageError::Navigation`] so the attempt is retried.
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<Navigation, PageError>;

    /// Wait until `selector` reaches `state`, or until `timeout` elapses.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
        state: WaitState,
    ) -> Result<WaitOutcome, PageError>;

    async fn wait_for_timeout(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

//! Scripted in-memory page used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use ppi_core::{WaitState, WaitUntil};

use crate::error::PageError;
use crate::page::{Navigation, NodeSnapshot, Page, PageSnapshot, WaitOutcome};

pub(crate) fn node(text: &str) -> NodeSnapshot {
    NodeSnapshot {
        text: text.to_owned(),
        ..NodeSnapshot::default()
    }
}

impl NodeSnapshot {
    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    pub(crate) fn parent(mut self, text: &str) -> Self {
        self.parent_text = Some(text.to_owned());
        self
    }
}

/// Page whose DOM is a selector → node map.
///
/// Navigation results are popped from a script (default: HTTP 200). Each
/// successful navigation may also swap in the next queued document.
#[derive(Default)]
pub(crate) struct FakePage {
    nodes: HashMap<String, NodeSnapshot>,
    documents: VecDeque<HashMap<String, NodeSnapshot>>,
    navigations: VecDeque<Result<Navigation, PageError>>,
    hang_on_navigate: bool,
    pub calls: Vec<String>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, selector: &str, node: NodeSnapshot) -> Self {
        self.nodes.insert(selector.to_owned(), node);
        self
    }

    /// Queue a document that replaces the DOM on the next successful navigation.
    pub(crate) fn then_document(mut self, nodes: Vec<(&str, NodeSnapshot)>) -> Self {
        self.documents.push_back(
            nodes
                .into_iter()
                .map(|(sel, n)| (sel.to_owned(), n))
                .collect(),
        );
        self
    }

    pub(crate) fn navigation(mut self, result: Result<Navigation, PageError>) -> Self {
        self.navigations.push_back(result);
        self
    }

    pub(crate) fn hanging(mut self) -> Self {
        self.hang_on_navigate = true;
        self
    }

    pub(crate) fn count_calls(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

pub(crate) fn nav_timeout(url: &str) -> PageError {
    PageError::Timeout {
        url: url.to_owned(),
        timeout_ms: 10,
    }
}

pub(crate) fn nav_ok(status: u16) -> Result<Navigation, PageError> {
    Ok(Navigation {
        status: Some(status),
    })
}

impl PageSnapshot for FakePage {
    fn query_selector(&self, selector: &str) -> Result<Option<NodeSnapshot>, PageError> {
        if selector.starts_with("[[") {
            return Err(PageError::InvalidSelector {
                selector: selector.to_owned(),
                reason: "unbalanced brackets".to_owned(),
            });
        }
        Ok(self.nodes.get(selector).cloned())
    }
}

#[async_trait]
impl Page for FakePage {
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        _timeout: Duration,
    ) -> Result<Navigation, PageError> {
        self.calls.push(format!("goto {url} {wait_until}"));
        if self.hang_on_navigate {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let result = self.navigations.pop_front().unwrap_or_else(|| nav_ok(200));
        if result.is_ok() {
            if let Some(next) = self.documents.pop_front() {
                self.nodes = next;
            }
        }
        result
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
        state: WaitState,
    ) -> Result<WaitOutcome, PageError> {
        self.calls.push(format!("wait {selector} {state}"));
        let present = self.query_selector(selector)?.is_some();
        Ok(if present == state.expects_presence() {
            WaitOutcome::Reached
        } else {
            WaitOutcome::TimedOut
        })
    }

    async fn wait_for_timeout(&mut self, duration: Duration) {
        self.calls.push(format!("pause {}", duration.as_millis()));
    }
}

//! Selector parsing and single-selector resolution.
//!
//! A selector is plain CSS with an optional trailing modifier:
//!
//! - `meta[itemprop='price']::attr(content)`: value of the `content` attribute.
//! - `span.price::parent_text`: text of the matched element's parent.
//!
//! Resolved values are whitespace-trimmed and NBSP-normalized. An empty value
//! after normalization is reported as absent.

use crate::error::PageError;
use crate::page::PageSnapshot;

const ATTR_MARKER: &str = "::attr(";
const PARENT_TEXT_SUFFIX: &str = "::parent_text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorMode {
    Text,
    ParentText,
    Attr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec {
    /// CSS part, with the modifier removed.
    pub css: String,
    pub mode: SelectorMode,
}

impl SelectorSpec {
    #[must_use]
    pub fn is_attribute(&self) -> bool {
        matches!(self.mode, SelectorMode::Attr(_))
    }
}

/// Splits a raw selector into its CSS part and extraction mode.
#[must_use]
pub fn parse_selector(raw: &str) -> SelectorSpec {
    let raw = raw.trim();

    if let Some(idx) = raw.rfind(ATTR_MARKER) {
        let rest = &raw[idx + ATTR_MARKER.len()..];
        if let Some(name) = rest.strip_suffix(')') {
            return SelectorSpec {
                css: raw[..idx].trim_end().to_owned(),
                mode: SelectorMode::Attr(name.trim().to_owned()),
            };
        }
    }

    if let Some(css) = raw.strip_suffix(PARENT_TEXT_SUFFIX) {
        return SelectorSpec {
            css: css.trim_end().to_owned(),
            mode: SelectorMode::ParentText,
        };
    }

    SelectorSpec {
        css: raw.to_owned(),
        mode: SelectorMode::Text,
    }
}

/// Trim, turn NBSP into plain spaces, trim again. Empty results are `None`.
#[must_use]
pub fn normalize_text(raw: &str) -> Option<String> {
    let normalized = raw.trim().replace('\u{a0}', " ");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_owned())
    }
}

/// Resolves one raw selector against the page.
///
/// # Errors
///
/// Propagates [`PageError`] from the page query (e.g. an unparseable selector).
pub fn resolve<S>(selector: &str, page: &S) -> Result<Option<String>, PageError>
where
    S: PageSnapshot + ?Sized,
{
    resolve_spec(&parse_selector(selector), page)
}

/// Resolves an already-parsed selector against the page.
///
/// # Errors
///
/// Propagates [`PageError`] from the page query.
pub fn resolve_spec<S>(spec: &SelectorSpec, page: &S) -> Result<Option<String>, PageError>
where
    S: PageSnapshot + ?Sized,
{
    let Some(node) = page.query_selector(&spec.css)? else {
        return Ok(None);
    };

    let raw = match &spec.mode {
        SelectorMode::Text => Some(node.text.as_str()),
        SelectorMode::ParentText => node.parent_text.as_deref(),
        SelectorMode::Attr(name) => node.attribute(name),
    };

    Ok(raw.and_then(normalize_text))
}

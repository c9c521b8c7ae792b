//! Price text cleanup for the output record.

use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid price regex"));

/// Keeps a price as a string, reduced to its first numeric token when there is
/// one. Thousands separators (`,`) are dropped first.
///
/// `"$ 1,234.56"` → `"1234.56"`; `"  only text  "` → `"only text"`.
#[must_use]
pub fn normalize_price_text(value: Option<&str>) -> Option<String> {
    let stripped = value?.trim();
    if stripped.is_empty() {
        return None;
    }
    let without_commas = stripped.replace(',', "");
    Some(
        NUMBER_RE
            .captures(&without_commas)
            .and_then(|caps| caps.get(1))
            .map_or_else(|| stripped.to_owned(), |m| m.as_str().to_owned()),
    )
}

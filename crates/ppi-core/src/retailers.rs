//! Retailer flow configuration: the YAML data model and its load-time checks.
//!
//! A retailer is described by a `base_url`, navigation settings, and an ordered
//! `flow` of [`FlowAction`]s. Older configs describe extraction with top-level
//! `pricing` / `discount` / `unit_price` blocks instead of an `extract` action;
//! those are folded into the flow by [`crate::normalize`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Attempt budget used when a flow has no `retry` action.
pub const DEFAULT_RETRY_LIMIT: u32 = 1;

const DEFAULT_GOTO_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PAUSE_MS: u64 = 1_000;

/// The only field name allowed to carry `discounted_price_override`.
pub const DISCOUNT_FIELD: &str = "discount";
pub const FINAL_PRICE_FIELD: &str = "final_price";
pub const UNIT_PRICE_FIELD: &str = "unit_price";

fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

fn default_goto_timeout_ms() -> u64 {
    DEFAULT_GOTO_TIMEOUT_MS
}

fn default_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

fn default_pause_ms() -> u64 {
    DEFAULT_PAUSE_MS
}

/// Page-load readiness signal handed to the navigation collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
    Commit,
}

impl WaitUntil {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::NetworkIdle => "networkidle",
            WaitUntil::Commit => "commit",
        }
    }
}

impl std::fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element state a `wait_for_selector` action waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    Attached,
    Detached,
    #[default]
    Visible,
    Hidden,
}

impl WaitState {
    /// `true` when the state is reached by the element being present.
    #[must_use]
    pub fn expects_presence(self) -> bool {
        matches!(self, WaitState::Attached | WaitState::Visible)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for WaitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative rule for extracting one named value from a page.
///
/// Exactly one of `selector` / `selectors_priority` must be set. An empty
/// string or empty list counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors_priority: Option<Vec<String>>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub discounted_price_override: bool,
}

/// Where a [`FieldSpec`] gets its selectors from, once exclusivity is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorSource<'a> {
    Single(&'a str),
    Priority(&'a [String]),
}

impl<'a> SelectorSource<'a> {
    /// Selectors in resolution order.
    #[must_use]
    pub fn selectors(&self) -> Vec<&'a str> {
        match *self {
            SelectorSource::Single(s) => vec![s],
            SelectorSource::Priority(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

impl FieldSpec {
    /// Returns the field's selector source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AmbiguousFieldSpec`] when both or neither of
    /// `selector` / `selectors_priority` are set.
    pub fn selector_source(
        &self,
        retailer: &str,
        field: &str,
    ) -> Result<SelectorSource<'_>, ConfigError> {
        let single = self.selector.as_deref().filter(|s| !s.is_empty());
        let priority = self
            .selectors_priority
            .as_deref()
            .filter(|list| !list.is_empty());

        match (single, priority) {
            (Some(s), None) => Ok(SelectorSource::Single(s)),
            (None, Some(list)) => Ok(SelectorSource::Priority(list)),
            _ => Err(ConfigError::AmbiguousFieldSpec {
                retailer: retailer.to_owned(),
                field: field.to_owned(),
            }),
        }
    }
}

/// One step of a retailer flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowAction {
    /// Navigate to a URL template (`{base_url}`, `{product_id}`, ...).
    Goto { url: String },
    /// Attempt budget for the whole flow. Does not touch the page.
    Retry {
        #[serde(default = "default_retry_limit")]
        limit: u32,
    },
    WaitForSelector {
        selector: String,
        #[serde(default = "default_wait_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },
    /// Fixed pause.
    WaitForTimeout {
        #[serde(default = "default_pause_ms")]
        timeout_ms: u64,
    },
    Extract { fields: BTreeMap<String, FieldSpec> },
}

impl FlowAction {
    #[must_use]
    pub fn is_extract(&self) -> bool {
        matches!(self, FlowAction::Extract { .. })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FlowAction::Goto { .. } => "goto",
            FlowAction::Retry { .. } => "retry",
            FlowAction::WaitForSelector { .. } => "wait_for_selector",
            FlowAction::WaitForTimeout { .. } => "wait_for_timeout",
            FlowAction::Extract { .. } => "extract",
        }
    }
}

/// Legacy `discount` / `unit_price` block, or the inner spec of `pricing`.
///
/// Same shape as [`FieldSpec`], except `optional` defaults to `true` when the
/// key is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors_priority: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default)]
    pub discounted_price_override: bool,
}

impl LegacyField {
    #[must_use]
    pub fn to_field_spec(&self) -> FieldSpec {
        FieldSpec {
            selector: self.selector.clone(),
            selectors_priority: self.selectors_priority.clone(),
            optional: self.optional.unwrap_or(true),
            discounted_price_override: self.discounted_price_override,
        }
    }
}

/// Legacy `pricing` block: either `{ final_price: {...} }` or a bare spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyPricing {
    Nested { final_price: LegacyField },
    Flat(LegacyField),
}

impl LegacyPricing {
    #[must_use]
    pub fn final_price(&self) -> &LegacyField {
        match self {
            LegacyPricing::Nested { final_price } => final_price,
            LegacyPricing::Flat(field) => field,
        }
    }
}

/// Soft-404 detection: a page matching any of these selectors is "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundConfig {
    #[serde(default)]
    pub any_selectors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerConfig {
    pub base_url: String,
    #[serde(default)]
    pub goto_wait_until: WaitUntil,
    #[serde(default = "default_goto_timeout_ms")]
    pub goto_timeout_ms: u64,
    pub flow: Vec<FlowAction>,
    #[serde(default)]
    pub not_found: NotFoundConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<LegacyPricing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<LegacyField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<LegacyField>,
}

impl RetailerConfig {
    /// Attempt budget for one lookup: the first `retry` action wins, otherwise
    /// [`DEFAULT_RETRY_LIMIT`].
    #[must_use]
    pub fn retry_limit(&self) -> u32 {
        self.flow
            .iter()
            .find_map(|action| match action {
                FlowAction::Retry { limit } => Some(*limit),
                _ => None,
            })
            .unwrap_or(DEFAULT_RETRY_LIMIT)
    }

    #[must_use]
    pub fn retry_action_count(&self) -> usize {
        self.flow
            .iter()
            .filter(|a| matches!(a, FlowAction::Retry { .. }))
            .count()
    }

    #[must_use]
    pub fn has_legacy_blocks(&self) -> bool {
        self.pricing.is_some() || self.discount.is_some() || self.unit_price.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailersFile {
    pub retailers: BTreeMap<String, RetailerConfig>,
}

impl RetailersFile {
    #[must_use]
    pub fn get(&self, retailer_id: &str) -> Option<&RetailerConfig> {
        self.retailers.get(retailer_id)
    }
}

/// Load and validate the retailers configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_retailers(path: &Path) -> Result<RetailersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RetailersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let retailers = parse_retailers(&content)?;
    validate_retailers(&retailers)?;

    Ok(retailers)
}

/// Parse retailers YAML without validating flows.
///
/// Accepts both `{retailers: {<id>: ...}}` and a bare `{<id>: ...}` mapping.
///
/// # Errors
///
/// Returns `ConfigError` if the document is not a mapping or does not match
/// the retailer schema (including unknown `action` discriminators).
pub fn parse_retailers(content: &str) -> Result<RetailersFile, ConfigError> {
    let document: serde_yaml::Value = serde_yaml::from_str(content)?;
    let serde_yaml::Value::Mapping(mut top) = document else {
        return Err(ConfigError::Validation(
            "YAML config must be a mapping at the top level".to_string(),
        ));
    };

    let retailers = match top.remove("retailers") {
        Some(inner @ serde_yaml::Value::Mapping(_)) => inner,
        Some(_) => {
            return Err(ConfigError::Validation(
                "retailers config must be a mapping".to_string(),
            ))
        }
        None => serde_yaml::Value::Mapping(top),
    };

    let retailers: BTreeMap<String, RetailerConfig> = serde_yaml::from_value(retailers)?;
    Ok(RetailersFile { retailers })
}

/// Check every retailer's flow and legacy blocks.
///
/// # Errors
///
/// Returns the first `ConfigError` found.
pub fn validate_retailers(file: &RetailersFile) -> Result<(), ConfigError> {
    for (retailer_id, config) in &file.retailers {
        validate_retailer(retailer_id, config)?;
    }
    Ok(())
}

/// Check one retailer's flow and legacy blocks.
///
/// # Errors
///
/// Returns the first `ConfigError` found.
pub fn validate_retailer(retailer_id: &str, config: &RetailerConfig) -> Result<(), ConfigError> {
    for action in &config.flow {
        match action {
            FlowAction::Retry { limit } if *limit == 0 => {
                return Err(ConfigError::Validation(format!(
                    "Retailer '{retailer_id}' retry.limit must be at least 1"
                )));
            }
            FlowAction::WaitForSelector { selector, .. } if selector.trim().is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "Retailer '{retailer_id}' wait_for_selector.selector must be non-empty"
                )));
            }
            FlowAction::Extract { fields } => {
                if fields.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Retailer '{retailer_id}' extract.fields must be a non-empty mapping"
                    )));
                }
                for (name, spec) in fields {
                    validate_field(retailer_id, name, spec)?;
                }
            }
            _ => {}
        }
    }

    // Legacy blocks are only checked when they will actually be used.
    crate::normalize::normalize_flow(retailer_id, config).map(|_| ())
}

pub(crate) fn validate_field(
    retailer_id: &str,
    name: &str,
    spec: &FieldSpec,
) -> Result<(), ConfigError> {
    spec.selector_source(retailer_id, name)?;
    if spec.discounted_price_override && name != DISCOUNT_FIELD {
        return Err(ConfigError::Validation(format!(
            "Retailer '{retailer_id}' field '{name}': discounted_price_override is only valid on the '{DISCOUNT_FIELD}' field"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "retailers_test.rs"]
mod tests;

//! Field extraction: one [`FieldSpec`] → one [`FieldValue`].
//!
//! Priority lists fall through on absent *and* empty values, so a selector
//! that matches an empty node never wins. After every field of an `extract`
//! action is resolved, a discount marked `discounted_price_override` replaces
//! the final price.

use std::collections::BTreeMap;

use ppi_core::{FieldSpec, DISCOUNT_FIELD, FINAL_PRICE_FIELD};

use crate::error::FlowError;
use crate::page::PageSnapshot;
use crate::selector::{parse_selector, resolve_spec};

/// Resolved value of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValue {
    pub value: Option<String>,
    /// `true` when the winning selector read an attribute (`::attr(..)`).
    pub attribute_extracted: bool,
}

impl FieldValue {
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub fields: BTreeMap<String, FieldValue>,
    /// Attempts consumed, including the successful one.
    pub tries: u32,
}

impl ExtractionResult {
    /// Value of `field`, if it was extracted and resolved.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|f| f.value.as_deref())
    }
}

/// Resolves one field against the page.
///
/// # Errors
///
/// - [`FlowError::Config`] if the spec sets both or neither selector kinds.
/// - [`FlowError::MissingField`] if nothing resolved and the field is not optional.
/// - [`FlowError::Page`] if the page rejects a selector query.
pub fn extract_field<S>(
    retailer: &str,
    field: &str,
    spec: &FieldSpec,
    page: &S,
) -> Result<FieldValue, FlowError>
where
    S: PageSnapshot + ?Sized,
{
    let selectors = spec.selector_source(retailer, field)?.selectors();

    for raw in &selectors {
        let parsed = parse_selector(raw);
        if let Some(value) = resolve_spec(&parsed, page).map_err(FlowError::Page)? {
            return Ok(FieldValue {
                value: Some(value),
                attribute_extracted: parsed.is_attribute(),
            });
        }
    }

    if spec.optional {
        tracing::debug!(retailer, field, "optional field absent");
        return Ok(FieldValue::absent());
    }

    Err(FlowError::MissingField {
        retailer: retailer.to_owned(),
        field: field.to_owned(),
        selectors: selectors.into_iter().map(str::to_owned).collect(),
    })
}

/// Resolves every field of an `extract` action, then applies the discount
/// override.
///
/// # Errors
///
/// Returns the first error from [`extract_field`].
pub fn extract_fields<S>(
    retailer: &str,
    fields: &BTreeMap<String, FieldSpec>,
    page: &S,
) -> Result<BTreeMap<String, FieldValue>, FlowError>
where
    S: PageSnapshot + ?Sized,
{
    let mut resolved = BTreeMap::new();
    for (name, spec) in fields {
        let value = extract_field(retailer, name, spec, page)?;
        resolved.insert(name.clone(), value);
    }

    apply_discount_override(retailer, fields, &mut resolved);
    Ok(resolved)
}

fn apply_discount_override(
    retailer: &str,
    fields: &BTreeMap<String, FieldSpec>,
    resolved: &mut BTreeMap<String, FieldValue>,
) {
    let overrides = fields
        .get(DISCOUNT_FIELD)
        .is_some_and(|spec| spec.discounted_price_override);
    if !overrides {
        return;
    }

    let Some(discount) = resolved
        .get(DISCOUNT_FIELD)
        .filter(|d| d.value.is_some())
        .cloned()
    else {
        return;
    };

    tracing::debug!(
        retailer,
        discount = discount.value.as_deref().unwrap_or_default(),
        "discount overrides final_price"
    );
    resolved.insert(FINAL_PRICE_FIELD.to_owned(), discount);
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;

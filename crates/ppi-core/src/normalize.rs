//! Legacy-to-canonical flow normalization.
//!
//! The interpreter only ever sees canonical flows: extraction is always an
//! `extract` action. Retailers still using top-level `pricing` / `discount` /
//! `unit_price` blocks get one synthesized `extract` action appended.

use std::collections::BTreeMap;

use crate::retailers::{
    validate_field, FieldSpec, FlowAction, RetailerConfig, RetailersFile, DISCOUNT_FIELD,
    FINAL_PRICE_FIELD, UNIT_PRICE_FIELD,
};
use crate::ConfigError;

/// Returns the canonical flow for one retailer.
///
/// - A flow with any `extract` action is returned unchanged; legacy blocks are
///   ignored entirely.
/// - Otherwise legacy blocks, if any, become one trailing `extract` action.
/// - With neither, the flow has no extraction step.
///
/// # Errors
///
/// Returns `ConfigError` if a legacy block that would be used is malformed.
pub fn normalize_flow(
    retailer_id: &str,
    config: &RetailerConfig,
) -> Result<Vec<FlowAction>, ConfigError> {
    let mut flow = config.flow.clone();
    if flow.iter().any(FlowAction::is_extract) {
        return Ok(flow);
    }

    let fields = legacy_extract_fields(retailer_id, config)?;
    if !fields.is_empty() {
        flow.push(FlowAction::Extract { fields });
    }
    Ok(flow)
}

/// Normalizes every retailer in a config file.
///
/// # Errors
///
/// Returns the first `ConfigError` produced by [`normalize_flow`].
pub fn normalize_retailers(
    file: &RetailersFile,
) -> Result<BTreeMap<String, Vec<FlowAction>>, ConfigError> {
    file.retailers
        .iter()
        .map(|(id, config)| Ok((id.clone(), normalize_flow(id, config)?)))
        .collect()
}

fn legacy_extract_fields(
    retailer_id: &str,
    config: &RetailerConfig,
) -> Result<BTreeMap<String, FieldSpec>, ConfigError> {
    let blocks = [
        (
            FINAL_PRICE_FIELD,
            config.pricing.as_ref().map(|p| p.final_price()),
        ),
        (DISCOUNT_FIELD, config.discount.as_ref()),
        (UNIT_PRICE_FIELD, config.unit_price.as_ref()),
    ];

    let mut fields = BTreeMap::new();
    for (name, block) in blocks {
        let Some(block) = block else { continue };
        let spec = block.to_field_spec();
        validate_field(retailer_id, name, &spec)?;
        fields.insert(name.to_owned(), spec);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retailers::parse_retailers;

    fn retailer(yaml: &str) -> RetailerConfig {
        let file = parse_retailers(yaml).expect("fixture should parse");
        file.retailers
            .into_values()
            .next()
            .expect("fixture has one retailer")
    }

    #[test]
    fn appends_extract_built_from_legacy_blocks() {
        let cfg = retailer(
            r#"
legacy:
  base_url: "https://example.com"
  flow:
    - action: goto
      url: "{base_url}/p/{product_id}"
  pricing:
    final_price:
      selectors_priority: [".price"]
  discount:
    selector: ".sale"
    discounted_price_override: true
  unit_price:
    selector: ".unit"
    optional: false
"#,
        );

        let flow = normalize_flow("legacy", &cfg).unwrap();
        assert_eq!(flow.len(), 2);
        let FlowAction::Extract { fields } = flow.last().unwrap() else {
            panic!("expected trailing extract, got {flow:?}");
        };
        assert_eq!(
            fields.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["discount", "final_price", "unit_price"]
        );
        assert_eq!(
            fields["final_price"].selectors_priority,
            Some(vec![".price".to_string()])
        );
        assert!(fields["final_price"].optional, "legacy optional defaults to true");
        assert!(fields["discount"].discounted_price_override);
        assert!(!fields["unit_price"].optional, "explicit optional is kept");
    }

    #[test]
    fn flat_pricing_block_maps_to_final_price() {
        let cfg = retailer(
            r#"
flat:
  base_url: "https://example.com"
  flow:
    - action: goto
      url: "{base_url}/p/{product_id}"
  pricing:
    selectors_priority: ["span.price"]
"#,
        );

        let flow = normalize_flow("flat", &cfg).unwrap();
        let extracts: Vec<_> = flow.iter().filter(|a| a.is_extract()).collect();
        assert_eq!(extracts.len(), 1);
        let FlowAction::Extract { fields } = &flow[1] else {
            panic!("extract must be last");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(
            fields["final_price"].selectors_priority.as_deref(),
            Some(&["span.price".to_string()][..])
        );
    }

    #[test]
    fn explicit_extract_wins_over_legacy_blocks() {
        let cfg = retailer(
            r#"
modern:
  base_url: "https://example.com"
  flow:
    - action: goto
      url: "{base_url}/p/{product_id}"
    - action: extract
      fields:
        final_price:
          selector: ".price"
  pricing:
    final_price:
      selectors_priority: [".legacy"]
  discount:
    selector: ".legacy-sale"
"#,
        );

        let flow = normalize_flow("modern", &cfg).unwrap();
        assert_eq!(flow, cfg.flow, "flow must pass through unchanged");
        let FlowAction::Extract { fields } = &flow[1] else {
            panic!("expected extract");
        };
        assert_eq!(fields["final_price"].selector.as_deref(), Some(".price"));
        assert!(!fields.contains_key("discount"));
    }

    #[test]
    fn no_extract_and_no_legacy_leaves_flow_alone() {
        let cfg = retailer(
            r#"
bare:
  base_url: "https://example.com"
  flow:
    - action: goto
      url: "{base_url}/p/{product_id}"
    - action: wait_for_selector
      selector: "body"
"#,
        );

        let flow = normalize_flow("bare", &cfg).unwrap();
        assert_eq!(flow, cfg.flow);
        assert!(!flow.iter().any(FlowAction::is_extract));
    }

    #[test]
    fn legacy_block_without_selectors_is_rejected() {
        let cfg = retailer(
            r#"
broken:
  base_url: "https://example.com"
  flow: []
  unit_price:
    optional: true
"#,
        );

        let err = normalize_flow("broken", &cfg).unwrap_err();
        assert!(
            matches!(err, ConfigError::AmbiguousFieldSpec { ref field, .. } if field == "unit_price"),
            "got: {err:?}"
        );
    }

    #[test]
    fn normalize_retailers_covers_every_retailer() {
        let file = parse_retailers(
            r#"
retailers:
  a:
    base_url: "https://a.example"
    flow: []
    pricing:
      selector: ".a"
  b:
    base_url: "https://b.example"
    flow: []
"#,
        )
        .unwrap();

        let flows = normalize_retailers(&file).unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows["a"].len(), 1);
        assert!(flows["b"].is_empty());
    }
}

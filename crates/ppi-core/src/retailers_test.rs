use std::path::Path;

use super::*;

const MODERN: &str = r#"
retailers:
  demo:
    base_url: "https://example.com"
    goto_wait_until: networkidle
    flow:
      - action: goto
        url: "{base_url}/p/{product_id}"
      - action: retry
        limit: 3
      - action: wait_for_selector
        selector: ".price"
        timeout_ms: 5000
        state: attached
      - action: wait_for_timeout
      - action: extract
        fields:
          final_price:
            selectors_priority: ["meta[itemprop='price']::attr(content)", ".price"]
          discount:
            selector: ".sale"
            optional: true
            discounted_price_override: true
"#;

#[test]
fn parses_wrapped_retailers_mapping() {
    let file = parse_retailers(MODERN).unwrap();
    let demo = file.get("demo").expect("demo retailer");
    assert_eq!(demo.base_url, "https://example.com");
    assert_eq!(demo.goto_wait_until, WaitUntil::NetworkIdle);
    assert_eq!(demo.goto_timeout_ms, 30_000);
    assert_eq!(demo.flow.len(), 5);
    assert_eq!(
        demo.flow[0],
        FlowAction::Goto {
            url: "{base_url}/p/{product_id}".to_string()
        }
    );
    assert_eq!(
        demo.flow[2],
        FlowAction::WaitForSelector {
            selector: ".price".to_string(),
            timeout_ms: 5000,
            state: WaitState::Attached,
        }
    );
    assert_eq!(demo.flow[3], FlowAction::WaitForTimeout { timeout_ms: 1000 });
    assert!(validate_retailers(&file).is_ok());
}

#[test]
fn parses_bare_retailers_mapping() {
    let file = parse_retailers(
        r#"
demo:
  base_url: "https://example.com"
  flow: []
"#,
    )
    .unwrap();
    let demo = file.get("demo").unwrap();
    assert_eq!(demo.goto_wait_until, WaitUntil::DomContentLoaded);
    assert!(demo.flow.is_empty());
    assert!(demo.not_found.any_selectors.is_empty());
}

#[test]
fn rejects_non_mapping_document() {
    let err = parse_retailers("- just\n- a list\n").unwrap_err();
    assert!(err.to_string().contains("mapping at the top level"));
}

#[test]
fn rejects_unknown_action_discriminator() {
    let result = parse_retailers(
        r#"
demo:
  base_url: "https://example.com"
  flow:
    - action: click
      selector: ".buy"
"#,
    );
    assert!(
        matches!(result, Err(ConfigError::RetailersFileParse(_))),
        "got: {result:?}"
    );
}

#[test]
fn rejects_action_missing_required_field() {
    let result = parse_retailers(
        r#"
demo:
  base_url: "https://example.com"
  flow:
    - action: goto
"#,
    );
    assert!(matches!(result, Err(ConfigError::RetailersFileParse(_))));
}

#[test]
fn retry_limit_defaults_to_one() {
    let file = parse_retailers(
        r#"
demo:
  base_url: "https://example.com"
  flow:
    - action: goto
      url: "{base_url}"
"#,
    )
    .unwrap();
    assert_eq!(file.get("demo").unwrap().retry_limit(), 1);
}

#[test]
fn retry_without_limit_uses_default() {
    let file = parse_retailers(
        r#"
demo:
  base_url: "https://example.com"
  flow:
    - action: retry
"#,
    )
    .unwrap();
    assert_eq!(
        file.get("demo").unwrap().flow[0],
        FlowAction::Retry { limit: 1 }
    );
}

#[test]
fn first_retry_action_wins() {
    let file = parse_retailers(
        r#"
demo:
  base_url: "https://example.com"
  flow:
    - action: retry
      limit: 4
    - action: retry
      limit: 9
"#,
    )
    .unwrap();
    let demo = file.get("demo").unwrap();
    assert_eq!(demo.retry_limit(), 4);
    assert_eq!(demo.retry_action_count(), 2);
}

#[test]
fn validate_rejects_zero_retry_limit() {
    let file = parse_retailers(
        r#"
demo:
  base_url: "https://example.com"
  flow:
    - action: retry
      limit: 0
"#,
    )
    .unwrap();
    let err = validate_retailers(&file).unwrap_err();
    assert!(err.to_string().contains("retry.limit must be at least 1"));
}

#[test]
fn validate_rejects_field_with_both_selector_kinds() {
    let file = parse_retailers(
        r#"
broken:
  base_url: "https://example.com"
  flow:
    - action: extract
      fields:
        final_price:
          selector: ".price"
          selectors_priority: [".a", ".b"]
"#,
    )
    .unwrap();
    let err = validate_retailers(&file).unwrap_err();
    assert!(
        err.to_string()
            .contains("exactly one of selector or selectors_priority"),
        "got: {err}"
    );
}

#[test]
fn validate_rejects_field_with_no_selector() {
    let file = parse_retailers(
        r#"
broken:
  base_url: "https://example.com"
  flow:
    - action: extract
      fields:
        final_price:
          optional: true
"#,
    )
    .unwrap();
    let err = validate_retailers(&file).unwrap_err();
    assert!(matches!(err, ConfigError::AmbiguousFieldSpec { ref retailer, ref field }
        if retailer == "broken" && field == "final_price"));
}

#[test]
fn validate_rejects_empty_extract_fields() {
    let file = parse_retailers(
        r#"
broken:
  base_url: "https://example.com"
  flow:
    - action: extract
      fields: {}
"#,
    )
    .unwrap();
    let err = validate_retailers(&file).unwrap_err();
    assert!(err.to_string().contains("non-empty mapping"));
}

#[test]
fn validate_rejects_override_outside_discount_field() {
    let file = parse_retailers(
        r#"
broken:
  base_url: "https://example.com"
  flow:
    - action: extract
      fields:
        unit_price:
          selector: ".unit"
          discounted_price_override: true
"#,
    )
    .unwrap();
    let err = validate_retailers(&file).unwrap_err();
    assert!(err.to_string().contains("only valid on the 'discount' field"));
}

#[test]
fn empty_selector_counts_as_unset() {
    let spec = FieldSpec {
        selector: Some(String::new()),
        selectors_priority: Some(vec![".a".to_string()]),
        ..FieldSpec::default()
    };
    assert_eq!(
        spec.selector_source("r", "f").unwrap(),
        SelectorSource::Priority(&[".a".to_string()])
    );
}

#[test]
fn selector_source_lists_selectors_in_order() {
    let spec = FieldSpec {
        selectors_priority: Some(vec![".a".to_string(), ".b".to_string()]),
        ..FieldSpec::default()
    };
    assert_eq!(
        spec.selector_source("r", "f").unwrap().selectors(),
        vec![".a", ".b"]
    );
}

#[test]
fn wait_state_presence() {
    assert!(WaitState::Attached.expects_presence());
    assert!(WaitState::Visible.expects_presence());
    assert!(!WaitState::Detached.expects_presence());
    assert!(!WaitState::Hidden.expects_presence());
}

#[test]
fn wait_until_display() {
    assert_eq!(WaitUntil::DomContentLoaded.to_string(), "domcontentloaded");
    assert_eq!(WaitUntil::NetworkIdle.to_string(), "networkidle");
}

#[test]
fn load_retailers_from_real_file() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
        .join("retailers")
        .join("retailers.yaml");
    assert!(
        path.exists(),
        "retailers.yaml missing at {path:?}; required for this test"
    );
    let result = load_retailers(&path);
    assert!(result.is_ok(), "failed to load retailers.yaml: {result:?}");
    let file = result.unwrap();
    assert!(!file.retailers.is_empty());
}

#[test]
fn load_retailers_reports_missing_file() {
    let err = load_retailers(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::RetailersFileIo { .. }));
}

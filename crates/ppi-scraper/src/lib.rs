pub mod error;
pub mod extract;
pub mod flow;
pub mod html_page;
pub mod page;
pub mod price;
pub mod selector;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{FlowError, LookupFailure, PageError};
pub use extract::{extract_field, extract_fields, ExtractionResult, FieldValue};
pub use flow::{render_url, FlowInterpreter, FlowState, Lookup, LookupContext};
pub use html_page::{build_client, HtmlPage};
pub use page::{Navigation, NodeSnapshot, Page, PageSnapshot, WaitOutcome};
pub use price::normalize_price_text;
pub use selector::{normalize_text, parse_selector, resolve, SelectorMode, SelectorSpec};

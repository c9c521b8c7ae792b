pub mod app_config;
pub mod config;
pub mod normalize;
pub mod retailers;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use normalize::{normalize_flow, normalize_retailers};
pub use retailers::{
    load_retailers, parse_retailers, validate_retailer, validate_retailers, FieldSpec, FlowAction,
    LegacyField, LegacyPricing, NotFoundConfig, RetailerConfig, RetailersFile, SelectorSource,
    WaitState, WaitUntil, DEFAULT_RETRY_LIMIT, DISCOUNT_FIELD, FINAL_PRICE_FIELD,
    UNIT_PRICE_FIELD,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read retailers file {path}: {source}")]
    RetailersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse retailers file: {0}")]
    RetailersFileParse(#[from] serde_yaml::Error),

    #[error(
        "Retailer '{retailer}' field '{field}' must define exactly one of selector or selectors_priority"
    )]
    AmbiguousFieldSpec { retailer: String, field: String },

    #[error("config validation error: {0}")]
    Validation(String),
}

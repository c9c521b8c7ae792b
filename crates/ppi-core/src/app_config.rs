use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-level settings for a scrape run.
///
/// Retailer definitions live in the YAML file at `retailers_path`; this struct
/// only carries paths and transport knobs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub retailers_path: PathBuf,
    pub targets_path: PathBuf,
    pub output_path: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_concurrent_lookups: usize,
    /// Pause between two attempts of the same lookup.
    pub retry_delay_ms: u64,
}

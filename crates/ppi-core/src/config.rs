use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

pub const DEFAULT_RETAILERS_PATH: &str = "config/retailers/retailers.yaml";
pub const DEFAULT_TARGETS_PATH: &str = "input/targets.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "output/results.csv";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can use a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("PPI_ENV", "development"))?;
    let log_level = or_default("PPI_LOG_LEVEL", "info");

    let retailers_path = PathBuf::from(or_default("PPI_CONFIG_PATH", DEFAULT_RETAILERS_PATH));
    let targets_path = PathBuf::from(or_default("PPI_TARGETS_PATH", DEFAULT_TARGETS_PATH));
    let output_path = PathBuf::from(or_default("PPI_OUTPUT_PATH", DEFAULT_OUTPUT_PATH));

    let request_timeout_secs = parse_u64("PPI_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("PPI_USER_AGENT", DEFAULT_USER_AGENT);
    let max_concurrent_lookups = parse_usize("PPI_MAX_CONCURRENT_LOOKUPS", "1")?;
    if max_concurrent_lookups == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PPI_MAX_CONCURRENT_LOOKUPS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let retry_delay_ms = parse_u64("PPI_RETRY_DELAY_MS", "250")?;

    Ok(AppConfig {
        env,
        log_level,
        retailers_path,
        targets_path,
        output_path,
        request_timeout_secs,
        user_agent,
        max_concurrent_lookups,
        retry_delay_ms,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PPI_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

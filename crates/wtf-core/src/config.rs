use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation only; tests drive it with a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let store_url = require("WTF_STORE_URL")?;
    if !(store_url.starts_with("http://") || store_url.starts_with("https://")) {
        return Err(ConfigError::InvalidEnvVar {
            var: "WTF_STORE_URL".to_string(),
            reason: format!("expected an http(s) URL, got \"{store_url}\""),
        });
    }

    let env = parse_environment(&or_default("WTF_ENV", "development"))?;
    let log_level = or_default("WTF_LOG_LEVEL", "info");
    let menu_path = PathBuf::from(or_default("WTF_MENU_PATH", "./config/menu.yaml"));
    let backup_dir = PathBuf::from(or_default("WTF_BACKUP_DIR", "./.wtf"));

    let backup_ttl_secs = parse_u64("WTF_BACKUP_TTL_SECS", "86400")?;
    if backup_ttl_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "WTF_BACKUP_TTL_SECS".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    let cart_token = lookup("WTF_CART_TOKEN").ok().filter(|t| !t.is_empty());

    let cart_request_timeout_secs = parse_u64("WTF_CART_REQUEST_TIMEOUT_SECS", "12")?;
    if !(1..=60).contains(&cart_request_timeout_secs) {
        return Err(ConfigError::InvalidEnvVar {
            var: "WTF_CART_REQUEST_TIMEOUT_SECS".to_string(),
            reason: format!("must be within 1..=60, got {cart_request_timeout_secs}"),
        });
    }

    let cart_user_agent = or_default("WTF_CART_USER_AGENT", "wtf-cart/0.1 (storefront-client)");

    let cart_max_retries = parse_u32("WTF_CART_MAX_RETRIES", "1")?;
    if cart_max_retries > 1 {
        return Err(ConfigError::InvalidEnvVar {
            var: "WTF_CART_MAX_RETRIES".to_string(),
            reason: format!("at most one retry is allowed, got {cart_max_retries}"),
        });
    }
    let cart_retry_delay_ms = parse_u64("WTF_CART_RETRY_DELAY_MS", "500")?;

    let currency = or_default("WTF_CURRENCY", "USD").to_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::InvalidEnvVar {
            var: "WTF_CURRENCY".to_string(),
            reason: format!("expected a 3-letter ISO code, got \"{currency}\""),
        });
    }

    Ok(AppConfig {
        store_url,
        env,
        log_level,
        menu_path,
        backup_dir,
        backup_ttl_secs,
        cart_token,
        cart_request_timeout_secs,
        cart_user_agent,
        cart_max_retries,
        cart_retry_delay_ms,
        currency,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "WTF_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

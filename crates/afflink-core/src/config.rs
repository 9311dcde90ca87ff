use crate::app_config::{AppConfig, Credentials, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Nothing here is strictly required: publisher credentials are optional at
/// load time and enforced per request by the scraper.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let non_empty = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
            },
        }
    };

    let env = parse_environment(&or_default("AFFLINK_ENV", "development"));
    let bind_addr = parse_addr("AFFLINK_BIND_ADDR", "0.0.0.0:3020")?;
    let log_level = or_default("AFFLINK_LOG_LEVEL", "info");

    let credentials = match (
        non_empty("AFFLINK_PUBLISHER_EMAIL"),
        non_empty("AFFLINK_PUBLISHER_PASSWORD"),
    ) {
        (Some(email), Some(password)) => Some(Credentials { email, password }),
        _ => None,
    };

    let login_url = or_default(
        "AFFLINK_LOGIN_URL",
        "https://accesstrade.co.id/publisher/login",
    );
    let listing_url = or_default(
        "AFFLINK_LISTING_URL",
        "https://db.accesstrade.co.id/tiktok-shop",
    );
    let session_path = PathBuf::from(or_default(
        "AFFLINK_SESSION_PATH",
        "./storage/session.json",
    ));
    let output_path = PathBuf::from(or_default(
        "AFFLINK_OUTPUT_PATH",
        "./data/outputs/latest.json",
    ));

    let extract_workers = parse_usize("AFFLINK_EXTRACT_WORKERS", "2")?;
    if extract_workers == 0 {
        return Err(invalid(
            "AFFLINK_EXTRACT_WORKERS",
            "must be at least 1".to_string(),
        ));
    }
    let nav_timeout_ms = parse_u64("AFFLINK_NAV_TIMEOUT_MS", "45000")?;
    let chromium_path = non_empty("AFFLINK_CHROMIUM_PATH").map(PathBuf::from);
    let headless = parse_bool("AFFLINK_HEADLESS", true)?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        credentials,
        login_url,
        listing_url,
        session_path,
        output_path,
        extract_workers,
        nav_timeout_ms,
        chromium_path,
        headless,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

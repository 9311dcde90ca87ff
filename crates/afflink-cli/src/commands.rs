//! Command handlers. Each one owns a [`Scout`] for its lifetime and shuts the
//! browser down before returning, whatever the outcome.

use std::process::ExitCode;

use afflink_core::AppConfig;
use afflink_scraper::{Scout, SearchEnvelope};

/// Runs one search and prints the response envelope to stdout.
///
/// A domain error is printed inside the envelope, exactly as the server would
/// return it, and turns into a failing exit code.
pub(crate) async fn run_search(
    config: &AppConfig,
    query: &str,
    min_price: u64,
    max_price: u64,
) -> anyhow::Result<ExitCode> {
    let scout = Scout::from_config(config);
    let outcome = scout.search_text(query, min_price, max_price).await;
    scout.shutdown().await;

    let (envelope, code) = match outcome {
        Ok(results) => (SearchEnvelope::ok(results), ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(query, error = %e, "search failed");
            (SearchEnvelope::error(e.to_string()), ExitCode::FAILURE)
        }
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(code)
}

/// Forces a fresh login and saves the session blob.
pub(crate) async fn run_login(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let scout = Scout::from_config(config);
    let outcome = scout.login().await;
    scout.shutdown().await;
    outcome?;
    println!("session saved to {}", config.session_path.display());
    Ok(ExitCode::SUCCESS)
}

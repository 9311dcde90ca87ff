use thiserror::Error;

/// Failures of the page-automation primitives.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("no element matches selector {selector}")]
    NotFound { selector: String },

    #[error("browser backend error: {0}")]
    Backend(String),

    #[error("session state could not be applied: {0}")]
    Session(String),
}

/// Request-level failures. Every variant is fatal for the request that hit it;
/// per-item extraction problems never surface here.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Validation(#[from] afflink_core::QueryError),

    #[error("login failed: {0}")]
    Authentication(String),

    #[error("listing unavailable: {0}")]
    ListingUnavailable(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("session store error at {path}: {source}")]
    SessionStore {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session blob at {path} is not valid JSON: {source}")]
    SessionDecode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write output to {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single item came back without a link. Logged and recovered as a
/// null `affiliate_url`; never returned to the caller.
#[derive(Debug, Error)]
pub enum ExtractFailure {
    #[error("no rendered row resolves to the item")]
    IdentityNotFound,

    #[error("link panel timed out in state {state}")]
    Timeout { state: &'static str },

    #[error("link panel could not be closed")]
    PanelStuck,

    #[error("row moved while its panel was open")]
    RowMoved,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

use std::net::SocketAddr;
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

/// Publisher account used to sign in to the affiliate dashboard.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// `None` when either half of the login is unset. Checked per request,
    /// not at startup, so the service can boot and report the problem.
    pub credentials: Option<Credentials>,
    pub login_url: String,
    pub listing_url: String,
    pub session_path: PathBuf,
    pub output_path: PathBuf,
    pub extract_workers: usize,
    pub nav_timeout_ms: u64,
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
}

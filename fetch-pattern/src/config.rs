use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str =
    concat!("fetch-pattern/", env!("CARGO_PKG_VERSION"));

/// Settings for [`HttpTransport`](crate::HttpTransport).
///
/// Environment variables can be set directly or loaded from a .env file:
/// - FETCH_BASE_URL: prefix for relative request URLs (optional)
/// - FETCH_TIMEOUT_SECS: default per-request timeout (optional, default 30)
/// - FETCH_USER_AGENT: user agent header (optional)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FETCH_TIMEOUT_SECS must be a positive integer, got {0:?}")]
    InvalidTimeout(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TransportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Silently ignore a missing .env file
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = lookup("FETCH_BASE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let timeout = match lookup("FETCH_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => defaults.timeout,
        };

        let user_agent =
            lookup("FETCH_USER_AGENT").unwrap_or(defaults.user_agent);

        Ok(Self {
            base_url,
            timeout,
            user_agent,
        })
    }
}

//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `APPHUB_BASE_URL` - Public URL of the site (decides secure cookies)
//! - `APPHUB_ADMIN_EMAIL` - The one account allowed into the admin area
//! - `FIREBASE_API_KEY` - Web API key of the Firebase project
//! - `FIREBASE_PROJECT_ID` - Firebase project id
//! - `FIREBASE_DATABASE_URL` - Realtime Database URL (e.g. `https://<db>.firebaseio.com`)
//!
//! ## Optional
//! - `APPHUB_HOST` - Bind address (default: 127.0.0.1)
//! - `APPHUB_PORT` - Listen port (default: 3000)
//! - `APPHUB_SITE_NAME` - Title shown in the header (default: App Hub)
//! - `APPHUB_APP_ID` - Namespace for the collection (default: default-app-id)
//! - `APPHUB_INITIAL_AUTH_TOKEN` - Pre-provisioned custom token tried before guest sign-in
//! - `APPHUB_STARTUP_GRACE_MS` - Hide the loading indicator after this long (default: 2000)
//! - `APPHUB_LOG_JSON` - Emit JSON logs when set
//! - `APPHUB_STATIC_DIR` - Directory served under `/static` (default: this crate's `static/`)
//! - `FIREBASE_AUTH_ENDPOINT` - Identity Toolkit base URL (default: Google's v1 endpoint)
//! - `GOOGLE_CLIENT_ID` - OAuth client id for the Google sign-in button
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use apphub_core::{AdminEmail, DEFAULT_APP_ID};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_AUTH_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_STARTUP_GRACE_MS: u64 = 2000;
const DEFAULT_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Title shown in the page header
    pub site_name: String,
    /// Account allowed into the admin area
    pub admin_email: AdminEmail,
    /// Raw namespace id for the collection path
    pub app_id: String,
    /// Custom token tried before anonymous sign-in
    pub initial_auth_token: Option<SecretString>,
    /// Delay after which the catalog stops showing as loading
    pub startup_grace: Duration,
    /// Firebase project settings
    pub firebase: FirebaseConfig,
    /// Google OAuth client id; the sign-in button is hidden without it
    pub google_client_id: Option<String>,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Directory of stylesheets, scripts and images
    pub static_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key
    pub api_key: SecretString,
    /// Project id
    pub project_id: String,
    /// Realtime Database root URL
    pub database_url: Url,
    /// Identity Toolkit base URL
    pub auth_endpoint: Url,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("database_url", &self.database_url.as_str())
            .field("auth_endpoint", &self.auth_endpoint.as_str())
            .finish()
    }
}

impl WebConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("APPHUB_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("APPHUB_HOST".to_string(), format!("{e}")))?;
        let port = parse_port(&get_env_or_default("APPHUB_PORT", "3000"))?;

        let admin_email = AdminEmail::parse(&get_required_env("APPHUB_ADMIN_EMAIL")?).map_err(
            |e| ConfigError::InvalidEnvVar("APPHUB_ADMIN_EMAIL".to_string(), e.to_string()),
        )?;

        let startup_grace = get_optional_env("APPHUB_STARTUP_GRACE_MS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar("APPHUB_STARTUP_GRACE_MS".to_string(), e.to_string())
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_STARTUP_GRACE_MS);

        Ok(Self {
            host,
            port,
            base_url: get_required_env("APPHUB_BASE_URL")?,
            site_name: get_env_or_default("APPHUB_SITE_NAME", "App Hub"),
            admin_email,
            app_id: get_env_or_default("APPHUB_APP_ID", DEFAULT_APP_ID),
            initial_auth_token: get_optional_env("APPHUB_INITIAL_AUTH_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .map(SecretString::from),
            startup_grace: Duration::from_millis(startup_grace),
            firebase: FirebaseConfig::from_env()?,
            google_client_id: get_optional_env("GOOGLE_CLIENT_ID").filter(|id| !id.is_empty()),
            log_json: get_optional_env("APPHUB_LOG_JSON").is_some(),
            static_dir: PathBuf::from(get_env_or_default("APPHUB_STATIC_DIR", DEFAULT_STATIC_DIR)),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the site is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl FirebaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_key = get_required_env("FIREBASE_API_KEY")?;
        validate_secret_strength(&api_key, "FIREBASE_API_KEY")?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            project_id: get_required_env("FIREBASE_PROJECT_ID")?,
            database_url: parse_url("FIREBASE_DATABASE_URL", &get_required_env("FIREBASE_DATABASE_URL")?)?,
            auth_endpoint: parse_url(
                "FIREBASE_AUTH_ENDPOINT",
                &get_env_or_default("FIREBASE_AUTH_ENDPOINT", DEFAULT_AUTH_ENDPOINT),
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable; blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.parse()
        .map_err(|e| ConfigError::InvalidEnvVar("APPHUB_PORT".to_string(), format!("{e}")))
}

fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate: f32 = raw
        .parse()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), format!("{e}")))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

/// Parse an absolute http(s) URL, normalising to a trailing slash so
/// relative joins append instead of replacing the last segment.
fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }

    let url = Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

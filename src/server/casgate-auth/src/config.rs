//! CAS client configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! server_url = "https://sso.example.com/cas"
//! proxy_callback = "https://app.example.com/cas/callback"
//! allowed_proxies = ["https://portal.example.com/pgt"]
//! auto_create_users = true
//!
//! [attributes]
//! "cas:email" = "email"
//!
//! [reconcile]
//! max_attempts = 5
//! retry_interval_ms = 1000
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Identity};
use serde::Deserialize;
use url::Url;

use casgate_protocol::{PROXY_PATH, PROXY_VALIDATE_PATH};

use crate::AuthError;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

/// Configuration of the CAS client.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CasConfig {
    /// Base URL of the CAS server (e.g. `https://sso.example.com/cas`).
    pub server_url: Url,

    /// Verify the CAS server TLS certificate.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// PEM file holding the client certificate and private key.
    #[serde(default)]
    pub client_cert: Option<PathBuf>,

    /// URL the CAS server delivers proxy-granting tickets to.
    #[serde(default)]
    pub proxy_callback: Option<Url>,

    /// Ask the CAS server to require primary credentials.
    #[serde(default)]
    pub renew: bool,

    /// Proxies allowed in a ticket's proxy chain. Empty allows any.
    #[serde(default)]
    pub allowed_proxies: Vec<String>,

    /// Create directory users on first login.
    #[serde(default)]
    pub auto_create_users: bool,

    /// CAS attribute name to directory field name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Timeout for each request to the CAS server.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Proxy callback reconciliation.
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
}

/// How long to wait for the proxy callback to deliver a PGT.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcilePolicy {
    /// Number of store lookups before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between lookups, in milliseconds.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_interval() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl ReconcilePolicy {
    /// Pause between lookups.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl CasConfig {
    /// Creates a configuration with defaults for everything but the server.
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            verify_tls: true,
            client_cert: None,
            proxy_callback: None,
            renew: false,
            allowed_proxies: Vec::new(),
            auto_create_users: false,
            attributes: BTreeMap::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            reconcile: ReconcilePolicy::default(),
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, AuthError> {
        let config: Self =
            toml::from_str(s).map_err(|e| AuthError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), AuthError> {
        if !matches!(self.server_url.scheme(), "http" | "https") {
            return Err(AuthError::Configuration(format!(
                "server_url must be http(s), got {}",
                self.server_url.scheme()
            )));
        }

        if let Some(callback) = &self.proxy_callback {
            if callback.scheme() != "https" {
                return Err(AuthError::Configuration(
                    "proxy_callback must use https".into(),
                ));
            }
        }

        if self.reconcile.max_attempts == 0 {
            return Err(AuthError::Configuration(
                "reconcile.max_attempts must be at least 1".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(AuthError::Configuration(
                "request_timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// `<server>/proxyValidate`.
    pub fn validate_url(&self) -> Result<Url, AuthError> {
        self.endpoint(PROXY_VALIDATE_PATH)
    }

    /// `<server>/proxy`.
    pub fn proxy_url(&self) -> Result<Url, AuthError> {
        self.endpoint(PROXY_PATH)
    }

    /// `<server>/login?service=...`, with `renew=true` when configured.
    pub fn login_url(&self, service: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("login")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("service", service);
            if self.renew {
                query.append_pair("renew", "true");
            }
        }
        Ok(url)
    }

    /// `<server>/logout`, optionally redirecting to `next`.
    pub fn logout_url(&self, next: Option<&str>) -> Result<Url, AuthError> {
        let mut url = self.endpoint("logout")?;
        if let Some(next) = next {
            url.query_pairs_mut().append_pair("url", next);
        }
        Ok(url)
    }

    /// Whether a proxy may appear in a ticket's proxy chain.
    pub fn is_proxy_allowed(&self, proxy: &str) -> bool {
        self.allowed_proxies.is_empty() || self.allowed_proxies.iter().any(|p| p == proxy)
    }

    /// Builds the HTTP client used to talk to the CAS server.
    pub fn http_client(&self) -> Result<Client, AuthError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .danger_accept_invalid_certs(!self.verify_tls);

        if let Some(path) = &self.client_cert {
            let pem = std::fs::read(path).map_err(|e| {
                AuthError::Configuration(format!("failed to read {}: {e}", path.display()))
            })?;
            let identity = Identity::from_pem(&pem)
                .map_err(|e| AuthError::Configuration(format!("invalid client cert: {e}")))?;
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to create HTTP client: {e}")))
    }

    /// Resolves `path` against the server URL, treating it as a directory.
    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        let mut base = self.server_url.clone();
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        base.set_query(None);

        base.join(path)
            .map_err(|e| AuthError::Configuration(format!("invalid endpoint {path}: {e}")))
    }
}

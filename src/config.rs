use std::time::Duration;

use url::Url;

use crate::envelope::EnvelopeKey;
use crate::error::Error;

/// What to do when encrypting an outbound body fails.
///
/// The legacy client silently fell back to sending plaintext. That behavior
/// is preserved behind [`PlaintextFallback`](Self::PlaintextFallback) but the
/// default aborts the request instead.
///
/// In practice encryption of a `serde_json::Value` cannot fail (the cipher
/// is infallible and `Value` always serializes), so this policy only matters
/// if the codec ever grows a fallible input path. It exists so the fail-open
/// choice is a visible configuration decision rather than an implicit one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptFailurePolicy {
    /// Fail the request with [`Error::Encrypt`](crate::Error::Encrypt).
    #[default]
    AbortRequest,
    /// Send the body unencrypted and log a warning.
    PlaintextFallback,
}

/// Gateway configuration.
///
/// Required fields (base URL, symmetric key) are constructor parameters — a
/// missing or malformed key is a hard error before any request is made, never
/// a logged warning.
///
/// Use [`from_env()`](GatewayConfig::from_env) for convention-based setup,
/// or [`new()`](GatewayConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub(crate) base_url: Url,
    pub(crate) key: EnvelopeKey,
    pub(crate) timeout: Duration,
    pub(crate) refresh_path: String,
    pub(crate) login_redirect: String,
    pub(crate) encrypt_failure: EncryptFailurePolicy,
}

impl GatewayConfig {
    /// Create a configuration with the required base URL and key.
    #[must_use]
    pub fn new(base_url: Url, key: EnvelopeKey) -> Self {
        Self {
            base_url,
            key,
            timeout: Duration::from_secs(10),
            refresh_path: "/refresh-token".into(),
            login_redirect: "/login".into(),
            encrypt_failure: EncryptFailurePolicy::default(),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// # Required env vars
    /// - `CLINIC_API_BASE_URL`: backend base URL
    /// - `CLINIC_API_AES_KEY`: 256-bit key (64 hex chars or 32 raw bytes)
    ///
    /// # Optional env vars
    /// - `CLINIC_API_TIMEOUT_SECS`: overall request timeout (default 10)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base_url_str = std::env::var("CLINIC_API_BASE_URL")
            .map_err(|_| Error::Config("CLINIC_API_BASE_URL is required".into()))?;
        let base_url: Url = base_url_str
            .parse()
            .map_err(|e| Error::Config(format!("CLINIC_API_BASE_URL: {e}")))?;

        let key_material = std::env::var("CLINIC_API_AES_KEY")
            .map_err(|_| Error::Config("CLINIC_API_AES_KEY is required".into()))?;
        let key = EnvelopeKey::parse(&key_material)?;

        let mut config = Self::new(base_url, key);

        if let Ok(secs) = std::env::var("CLINIC_API_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| Error::Config(format!("CLINIC_API_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Override the fixed overall request timeout (default: 10 seconds).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the refresh endpoint path (default: `/refresh-token`).
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Override where the shell should navigate after a terminal refresh
    /// failure (default: `/login`).
    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.login_redirect = path.into();
        self
    }

    /// Override the encryption failure policy (default: abort the request).
    #[must_use]
    pub fn with_encrypt_failure_policy(mut self, policy: EncryptFailurePolicy) -> Self {
        self.encrypt_failure = policy;
        self
    }

    /// Backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Overall request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Refresh endpoint path.
    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Login redirect path surfaced on terminal refresh failure.
    #[must_use]
    pub fn login_redirect(&self) -> &str {
        &self.login_redirect
    }

    /// Encryption failure policy.
    #[must_use]
    pub fn encrypt_failure_policy(&self) -> EncryptFailurePolicy {
        self.encrypt_failure
    }
}

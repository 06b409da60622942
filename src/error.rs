/// Gateway errors.
///
/// Decryption failures are deliberately *not* represented here: `decode`
/// returns `None` so callers can fall back to treating a payload as
/// unencrypted, matching the wire contract.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid configuration (base URL, key material).
    #[error("configuration error: {0}")]
    Config(String),

    /// Encrypting an outbound body failed and the policy is
    /// [`AbortRequest`](crate::EncryptFailurePolicy::AbortRequest).
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Transport-level failure (connect, timeout, TLS). Never retried.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the backend, body already decrypted
    /// best-effort so the message is readable.
    #[error("API error (status {status})")]
    Api { status: u16, body: serde_json::Value },

    /// Credentials rejected by the login or registration endpoint.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The silent session refresh failed. Terminal: the session has been
    /// cleared and the embedding shell should navigate to `redirect_to`.
    #[error("session refresh failed; re-authentication required")]
    RefreshFailed { redirect_to: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

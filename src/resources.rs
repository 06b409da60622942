//! Normalization boundary for response shapes.
//!
//! The backend is inconsistent about field casing (`accessToken` vs
//! `access_token`, `csrfToken` vs `csrf_token`). These records normalize the
//! spelling once at the edge via serde aliases; nothing past this module
//! should ever branch on a field's casing.

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Tokens minted by `/login` or `/refresh-token`.
///
/// `user` is present on login, usually absent on refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<i64>,
    #[serde(default, alias = "csrfToken")]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub user: Option<JsonValue>,
}

/// Response of `GET /csrf-token`.
#[derive(Debug, Clone, Deserialize)]
pub struct CsrfTokenResponse {
    #[serde(default, alias = "csrfToken")]
    pub csrf_token: Option<String>,
}

/// Best-effort view of an error body (`{"error": ..}` or `{"message": ..}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

impl ApiErrorBody {
    /// Extracts a human-readable message from an arbitrary error body.
    #[must_use]
    pub fn message_from(body: &JsonValue) -> Option<String> {
        serde_json::from_value::<Self>(body.clone())
            .ok()
            .and_then(|parsed| parsed.error)
    }
}

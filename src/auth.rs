//! Session lifecycle operations built on the gateway verbs.
//!
//! These mirror the backend's fixed auth endpoints: credentials go out
//! enveloped like any other body, and successful responses replace the whole
//! session snapshot through the [`SessionProvider`](crate::SessionProvider).

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::error::{Error, Result};
use crate::gateway::{Gateway, CSRF_PATH, LOGIN_PATH, LOGOUT_PATH, REGISTER_PATH};
use crate::resources::{ApiErrorBody, AuthTokens, CsrfTokenResponse};
use crate::session::{CsrfToken, Session, SessionProvider};

/// Login credentials. The backend validates that the account actually holds
/// the selected role.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub role: String,
}

impl Credentials {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            role: role.into(),
        }
    }
}

impl<S: SessionProvider> Gateway<S> {
    /// `POST /login`. On success the session is replaced with the returned
    /// user, access token, and expiry, and the new snapshot is returned.
    ///
    /// A 401 here never triggers a refresh — wrong credentials, not an
    /// expired session.
    ///
    /// # Errors
    ///
    /// [`Error::Auth`] when the backend rejects the credentials (including a
    /// 200 body carrying an `error` field, which this backend emits),
    /// [`Error::Http`]/[`Error::Api`] otherwise.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let body = serde_json::to_value(credentials)?;
        let response = match self.post(LOGIN_PATH, body).await {
            Ok(response) => response,
            Err(Error::Api { status, body }) if status == 401 => {
                let message = ApiErrorBody::message_from(&body)
                    .unwrap_or_else(|| "invalid credentials".into());
                return Err(Error::Auth(message));
            }
            Err(e) => return Err(e),
        };

        if let Some(message) = ApiErrorBody::message_from(&response) {
            return Err(Error::Auth(message));
        }

        let tokens: AuthTokens = serde_json::from_value(response)?;
        let session = Session::default().with_tokens(tokens);
        self.session.replace(session.clone()).await;
        tracing::debug!("login succeeded; session replaced");
        Ok(session)
    }

    /// `POST /register`. Returns the decoded response body; registration
    /// does not log the user in, so the session is untouched.
    ///
    /// # Errors
    ///
    /// [`Error::Auth`] on a 401 or an `error`-carrying body, transport and
    /// API errors otherwise.
    pub async fn register(&self, profile: JsonValue) -> Result<JsonValue> {
        let response = match self.post(REGISTER_PATH, profile).await {
            Ok(response) => response,
            Err(Error::Api { status, body }) if status == 401 => {
                let message = ApiErrorBody::message_from(&body)
                    .unwrap_or_else(|| "registration rejected".into());
                return Err(Error::Auth(message));
            }
            Err(e) => return Err(e),
        };
        if let Some(message) = ApiErrorBody::message_from(&response) {
            return Err(Error::Auth(message));
        }
        Ok(response)
    }

    /// `POST /logout`, then clear the session. The server call is
    /// fire-and-forget: a failure is logged and the local session is cleared
    /// regardless.
    pub async fn logout(&self) {
        if let Err(e) = self.post(LOGOUT_PATH, json!({})).await {
            tracing::warn!(error = %e, "logout request failed; clearing session anyway");
        }
        self.session.clear().await;
    }

    /// `GET /csrf-token` and store the token on the session.
    ///
    /// Called at startup: a page reload clears in-memory state while the
    /// backend session cookie may still be valid. Returns the token, or
    /// `None` when the server response carries none.
    ///
    /// # Errors
    ///
    /// Transport and API errors from the underlying `GET`.
    pub async fn fetch_csrf_token(&self) -> Result<Option<CsrfToken>> {
        let body = self.get(CSRF_PATH).await?;
        let parsed: CsrfTokenResponse = serde_json::from_value(body)?;
        let Some(token) = parsed.csrf_token else {
            return Ok(None);
        };

        let token = CsrfToken(token);
        let mut session = self.session.snapshot().await;
        session.csrf_token = Some(token.clone());
        self.session.replace(session).await;
        Ok(Some(token))
    }
}

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value as JsonValue};

use crate::config::{EncryptFailurePolicy, GatewayConfig};
use crate::envelope::{Envelope, EnvelopeCodec};
use crate::error::{Error, Result};
use crate::resources::AuthTokens;
use crate::session::{Session, SessionProvider};

/// Header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Fixed auth endpoints. A 401 from a path containing one of the first two
/// never triggers a refresh: the credentials are wrong, not expired.
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const LOGOUT_PATH: &str = "/logout";
pub const CSRF_PATH: &str = "/csrf-token";

/// An in-flight outbound call. The one-shot `retried` flag guarantees at
/// most one refresh-triggered replay per original request.
struct PendingRequest {
    method: Method,
    endpoint: String,
    url: String,
    body: Option<JsonValue>,
    retried: bool,
}

impl PendingRequest {
    fn new(config: &GatewayConfig, method: Method, endpoint: &str, body: Option<JsonValue>) -> Self {
        let endpoint = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{endpoint}")
        };
        let url = join_url(config, &endpoint);
        Self {
            method,
            endpoint,
            url,
            body,
            retried: false,
        }
    }

    fn is_auth_path(&self) -> bool {
        self.endpoint.contains(LOGIN_PATH) || self.endpoint.contains(REGISTER_PATH)
    }
}

fn join_url(config: &GatewayConfig, endpoint: &str) -> String {
    format!(
        "{}{endpoint}",
        config.base_url().as_str().trim_end_matches('/')
    )
}

/// Secure API gateway.
///
/// Wraps every outbound request: credential headers, envelope encryption of
/// the body, decryption of the response, and on a 401 a single silent session
/// refresh followed by a transparent replay of the original request.
///
/// All verbs are non-blocking and awaitable; ordering is only guaranteed
/// within one original request (its replay is strictly after its refresh).
/// Concurrent requests that independently hit 401 share one in-flight
/// refresh through an internal single-flight gate.
pub struct Gateway<S: SessionProvider> {
    pub(crate) http: reqwest::Client,
    pub(crate) codec: EnvelopeCodec,
    pub(crate) session: Arc<S>,
    pub(crate) config: GatewayConfig,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl<S: SessionProvider> Gateway<S> {
    /// Create a gateway over the given configuration and session provider.
    ///
    /// The underlying client keeps a cookie store: the HTTP-only refresh
    /// credential set by the backend rides along automatically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig, session: S) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            codec: EnvelopeCodec::new(config.key.clone()),
            session: Arc::new(session),
            config,
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// The session provider this gateway reads and writes.
    #[must_use]
    pub fn session_provider(&self) -> &S {
        &self.session
    }

    /// The envelope codec (same key as the gateway).
    #[must_use]
    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    // ── Convenience verbs ──────────────────────────────────────────

    /// `GET` an endpoint; returns the decoded body.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] on a non-success status, [`Error::Http`] on transport
    /// failure, [`Error::RefreshFailed`] if a 401 triggered a refresh that
    /// failed terminally.
    pub async fn get(&self, endpoint: &str) -> Result<JsonValue> {
        self.request(Method::GET, endpoint, None).await
    }

    /// `POST` a JSON body; returns the decoded body. See [`get`](Self::get)
    /// for the error contract.
    pub async fn post(&self, endpoint: &str, body: JsonValue) -> Result<JsonValue> {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    /// `PUT` a JSON body; returns the decoded body.
    pub async fn put(&self, endpoint: &str, body: JsonValue) -> Result<JsonValue> {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    /// `PATCH` a JSON body; returns the decoded body.
    pub async fn patch(&self, endpoint: &str, body: JsonValue) -> Result<JsonValue> {
        self.request(Method::PATCH, endpoint, Some(body)).await
    }

    /// `DELETE` an endpoint; returns the decoded body.
    pub async fn delete(&self, endpoint: &str) -> Result<JsonValue> {
        self.request(Method::DELETE, endpoint, None).await
    }

    /// `POST` a multipart form (file uploads). The form is sent as-is —
    /// multipart bodies are never enveloped — and, because a form cannot be
    /// rebuilt for replay, a 401 here surfaces as [`Error::Api`] instead of
    /// triggering refresh-and-replay. Refresh the session first if needed.
    ///
    /// # Errors
    ///
    /// [`Error::Api`] on a non-success status, [`Error::Http`] on transport failure.
    pub async fn post_form(
        &self,
        endpoint: &str,
        form: reqwest::multipart::Form,
    ) -> Result<JsonValue> {
        let req = PendingRequest::new(&self.config, Method::POST, endpoint, None);
        let session = self.session.snapshot().await;

        let mut builder = self.http.post(&req.url).multipart(form);
        if let Some(token) = &session.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(csrf) = &session.csrf_token {
            builder = builder.header(CSRF_HEADER, csrf.as_str());
        }
        let response = builder.send().await?;
        self.unwrap_response(response).await
    }

    // ── Core flow ──────────────────────────────────────────────────

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<JsonValue>,
    ) -> Result<JsonValue> {
        let mut req = PendingRequest::new(&self.config, method, endpoint, body);
        let session = self.session.snapshot().await;
        let response = self.dispatch(&req, &session).await?;

        let status = response.status();
        let body = read_body(response).await;

        if status.is_success() {
            return Ok(self.open(body));
        }

        if status == StatusCode::UNAUTHORIZED && !req.retried && !req.is_auth_path() {
            req.retried = true;
            return self.refresh_and_replay(req, session).await;
        }

        Err(Error::Api {
            status: status.as_u16(),
            body: self.open(body),
        })
    }

    /// Request interceptor: credential headers plus envelope encryption.
    /// No retries or branching on network state here.
    async fn dispatch(&self, req: &PendingRequest, session: &Session) -> Result<Response> {
        let mut builder = self.http.request(req.method.clone(), &req.url);
        if let Some(token) = &session.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(csrf) = &session.csrf_token {
            builder = builder.header(CSRF_HEADER, csrf.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.json(&self.seal(body)?);
        }
        Ok(builder.send().await?)
    }

    /// Wraps a JSON body in an envelope. Bodies already carrying a string
    /// `payload` field are forwarded as-is (never double-encrypted).
    fn seal(&self, body: &JsonValue) -> Result<JsonValue> {
        if body.get("payload").is_some_and(JsonValue::is_string) {
            return Ok(body.clone());
        }
        match self.codec.encode(body) {
            Ok(payload) => Ok(json!({ "payload": payload })),
            Err(e) => match self.config.encrypt_failure_policy() {
                EncryptFailurePolicy::AbortRequest => Err(e),
                EncryptFailurePolicy::PlaintextFallback => {
                    tracing::warn!(error = %e, "encryption failed; sending plaintext body");
                    Ok(body.clone())
                }
            },
        }
    }

    /// Response interceptor: if the body carries a `payload` field, replace
    /// it with the decrypted value; on decode failure leave the raw body so
    /// the caller can handle a malformed response.
    fn open(&self, body: JsonValue) -> JsonValue {
        let Some(payload) = body.get("payload").and_then(JsonValue::as_str) else {
            return body;
        };
        match self.codec.decode(payload) {
            Some(decoded) => decoded,
            None => {
                tracing::debug!("response payload did not decrypt; passing raw body through");
                body
            }
        }
    }

    async fn unwrap_response(&self, response: Response) -> Result<JsonValue> {
        let status = response.status();
        let body = read_body(response).await;
        if status.is_success() {
            Ok(self.open(body))
        } else {
            Err(Error::Api {
                status: status.as_u16(),
                body: self.open(body),
            })
        }
    }

    // ── Refresh state machine ──────────────────────────────────────

    /// NORMAL → REFRESHING → REPLAY, or REFRESHING → LOGGED_OUT.
    ///
    /// `stale` is the session the failing request was sent with. The gate
    /// makes concurrent 401s share one refresh: a waiter that acquires the
    /// gate after another caller already refreshed sees a changed access
    /// token and replays without a second refresh call.
    async fn refresh_and_replay(&self, req: PendingRequest, stale: Session) -> Result<JsonValue> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.session.snapshot().await;
        if current.access_token.is_some() && current.access_token != stale.access_token {
            tracing::debug!(
                endpoint = %req.endpoint,
                "session already refreshed by a concurrent request; replaying"
            );
            return self.replay(req, current).await;
        }

        tracing::debug!(endpoint = %req.endpoint, "401 received; attempting silent refresh");
        match self.refresh(&current).await {
            Ok(tokens) => {
                let renewed = current.with_tokens(tokens);
                self.session.replace(renewed.clone()).await;
                tracing::debug!(endpoint = %req.endpoint, "refresh succeeded; replaying");
                self.replay(req, renewed).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed; clearing session");
                self.session.clear().await;
                Err(Error::RefreshFailed {
                    redirect_to: self.config.login_redirect().to_string(),
                })
            }
        }
    }

    /// Dedicated refresh call: encrypted empty payload, CSRF header, and the
    /// HTTP-only refresh cookie supplied by the cookie store.
    async fn refresh(&self, session: &Session) -> Result<AuthTokens> {
        let payload = self.codec.encode(&json!({}))?;
        let url = join_url(&self.config, self.config.refresh_path());

        let mut builder = self.http.post(url).json(&Envelope { payload });
        if let Some(csrf) = &session.csrf_token {
            builder = builder.header(CSRF_HEADER, csrf.as_str());
        }
        let response = builder.send().await?;

        let status = response.status();
        let body = self.open(read_body(response).await);
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        // A refresh response without an access token is a failure.
        Ok(serde_json::from_value(body)?)
    }

    /// Re-issue the original request with the renewed session. A second 401
    /// here is returned as an error — the one-shot flag was already consumed.
    async fn replay(&self, req: PendingRequest, session: Session) -> Result<JsonValue> {
        let response = self.dispatch(&req, &session).await?;
        self.unwrap_response(response).await
    }
}

async fn read_body(response: Response) -> JsonValue {
    match response.text().await {
        Ok(text) if text.is_empty() => JsonValue::Null,
        Ok(text) => serde_json::from_str(&text).unwrap_or(JsonValue::String(text)),
        Err(_) => JsonValue::Null,
    }
}

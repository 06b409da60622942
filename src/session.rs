use std::future::Future;
use std::sync::Arc;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::resources::AuthTokens;

/// Opaque bearer access token minted by login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Server-issued anti-forgery token echoed back on state-changing requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Current authentication state, owned by the gateway's caller.
///
/// Created on successful login or refresh; cleared on logout or an
/// irrecoverable refresh failure. The gateway only reads snapshots and
/// requests whole-session replacements — never partial field writes, so a
/// reader across an await point always sees a consistent session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<AccessToken>,
    pub csrf_token: Option<CsrfToken>,
    /// Untyped user record as returned by the backend.
    pub user: Option<JsonValue>,
    /// Absolute expiry derived from the server's `expiresIn` seconds.
    pub expires_at: Option<OffsetDateTime>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Applies freshly minted tokens, keeping the existing user record when
    /// the server omits one (refresh responses usually do).
    #[must_use]
    pub fn with_tokens(mut self, tokens: AuthTokens) -> Self {
        self.access_token = Some(AccessToken(tokens.access_token));
        if let Some(csrf) = tokens.csrf_token {
            self.csrf_token = Some(CsrfToken(csrf));
        }
        if let Some(user) = tokens.user {
            self.user = Some(user);
        }
        self.expires_at = tokens
            .expires_in
            .map(|secs| OffsetDateTime::now_utc() + time::Duration::seconds(secs));
        self
    }
}

/// Consumer-provided session state.
///
/// The gateway reads a snapshot before each request; the refresh flow and the
/// auth operations are the only writers. Writes replace the whole session
/// atomically.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionProvider for MyAppState {
///     async fn snapshot(&self) -> Session {
///         self.session.read().await.clone()
///     }
///
///     async fn replace(&self, session: Session) {
///         *self.session.write().await = session;
///     }
///
///     async fn clear(&self) {
///         *self.session.write().await = Session::default();
///     }
/// }
/// ```
pub trait SessionProvider: Send + Sync + 'static {
    /// Current session snapshot.
    fn snapshot(&self) -> impl Future<Output = Session> + Send;

    /// Replace the whole session (login success, refresh success).
    fn replace(&self, session: Session) -> impl Future<Output = ()> + Send;

    /// Drop all credentials (logout, terminal refresh failure).
    fn clear(&self) -> impl Future<Output = ()> + Send;
}

/// In-memory [`SessionProvider`] backed by an `RwLock`.
///
/// Clones share the same underlying session, so keep a clone to inspect
/// state the gateway mutates.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    inner: Arc<tokio::sync::RwLock<Session>>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(session)),
        }
    }
}

impl SessionProvider for MemorySession {
    fn snapshot(&self) -> impl Future<Output = Session> + Send {
        let inner = Arc::clone(&self.inner);
        async move { inner.read().await.clone() }
    }

    fn replace(&self, session: Session) -> impl Future<Output = ()> + Send {
        let inner = Arc::clone(&self.inner);
        async move { *inner.write().await = session }
    }

    fn clear(&self) -> impl Future<Output = ()> + Send {
        let inner = Arc::clone(&self.inner);
        async move { *inner.write().await = Session::default() }
    }
}

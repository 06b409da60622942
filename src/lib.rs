#![doc = include_str!("../README.md")]

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod resources;
pub mod session;

// Re-exports for convenient access
pub use auth::Credentials;
pub use config::{EncryptFailurePolicy, GatewayConfig};
pub use envelope::{Envelope, EnvelopeCodec, EnvelopeKey};
pub use error::{Error, Result};
pub use gateway::{Gateway, CSRF_HEADER};
pub use resources::{ApiErrorBody, AuthTokens, CsrfTokenResponse};
pub use session::{AccessToken, CsrfToken, MemorySession, Session, SessionProvider};

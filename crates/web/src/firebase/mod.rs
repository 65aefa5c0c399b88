//! Firebase REST clients.
//!
//! # Architecture
//!
//! - [`IdentityToolkitClient`] implements [`apphub_core::IdentityProvider`]
//!   over the Identity Toolkit v1 REST API
//! - [`RealtimeDatabaseClient`] implements [`apphub_core::DataStore`] over the
//!   Realtime Database REST API, streaming changes as server-sent events
//! - Both convert their [`FirebaseError`] into [`ProviderError`] at the port
//!   boundary so the core never sees transport details
//!
//! # APIs
//!
//! - Identity Toolkit: `POST {endpoint}/accounts:<method>?key=<api key>`
//! - Realtime Database: `{database}/<path>.json?auth=<id token>`

mod auth;
mod database;
pub mod sse;

pub use auth::IdentityToolkitClient;
pub use database::RealtimeDatabaseClient;

use apphub_core::{ProviderError, ProviderErrorCode};
use thiserror::Error;

/// Errors that can occur when talking to Firebase.
#[derive(Debug, Error)]
pub enum FirebaseError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Identity Toolkit rejected the request (`"CODE : detail"`).
    #[error("{message}")]
    Identity { message: String },

    /// Realtime Database rejected the request.
    #[error("{message}")]
    Database { status: u16, message: String },

    /// The subscription was cancelled by the database (rules now deny it).
    #[error("Subscription cancelled: {0}")]
    Cancelled(String),

    /// The credential used by the subscription expired or was revoked.
    #[error("Credential revoked")]
    AuthRevoked,

    /// A response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<FirebaseError> for ProviderError {
    fn from(error: FirebaseError) -> Self {
        let message = error.to_string();
        let code = match &error {
            FirebaseError::Http(_) => ProviderErrorCode::Network,
            FirebaseError::Identity { message } => ProviderErrorCode::from_identity_message(message),
            FirebaseError::Database { status: 401 | 403, .. } | FirebaseError::Cancelled(_) => {
                ProviderErrorCode::PermissionDenied
            }
            FirebaseError::Database { status, .. } => ProviderErrorCode::Other(status.to_string()),
            FirebaseError::AuthRevoked => ProviderErrorCode::InvalidCredential,
            FirebaseError::Parse(_) | FirebaseError::Url(_) => ProviderErrorCode::Malformed,
        };
        Self::new(code, message)
    }
}

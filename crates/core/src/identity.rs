//! Users, credentials, and session classification.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Email, EmailError};

/// A user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned user id.
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub is_anonymous: bool,
}

impl User {
    /// An anonymous guest.
    #[must_use]
    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            email_verified: false,
            is_anonymous: true,
        }
    }

    /// A federated user with a verified email.
    #[must_use]
    pub fn federated(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: Some(email.into()),
            email_verified: true,
            is_anonymous: false,
        }
    }
}

/// A signed-in user together with the tokens the provider issued.
///
/// `Debug` is implemented manually to redact the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user: User,
    pub id_token: String,
    pub refresh_token: String,
}

impl Credential {
    #[must_use]
    pub fn new(user: User, id_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            user,
            id_token: id_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// The client's classification of the active identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    #[default]
    Unauthenticated,
    AnonymousGuest,
    AuthenticatedAdmin,
    /// A non-admin signed in with a real account. Transient: the controller
    /// signs such users out immediately.
    AuthenticatedNonAdmin,
}

/// The single email address allowed into the admin area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminEmail(Email);

impl AdminEmail {
    /// Parse the configured admin address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid email.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        Email::parse(raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Classify a reported user.
    ///
    /// Admin requires a non-anonymous user whose verified email matches.
    #[must_use]
    pub fn classify(&self, user: Option<&User>) -> Session {
        match user {
            None => Session::Unauthenticated,
            Some(user) if user.is_anonymous => Session::AnonymousGuest,
            Some(user) => {
                let matches = user
                    .email
                    .as_deref()
                    .is_some_and(|email| self.0.matches(email));
                if matches && user.email_verified {
                    Session::AuthenticatedAdmin
                } else {
                    Session::AuthenticatedNonAdmin
                }
            }
        }
    }
}

impl fmt::Display for AdminEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

//! Errors reported by the hosted identity provider and data store.

use thiserror::Error;

/// Classified provider error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// The operation is restricted to administrators (e.g. anonymous sign-in
    /// disabled at the project level).
    AdminRestricted,
    /// The sign-in method is not enabled for the project.
    OperationNotAllowed,
    /// Credentials were rejected or expired.
    InvalidCredential,
    /// Security rules rejected a read or write.
    PermissionDenied,
    /// The request never reached the provider or the connection dropped.
    Network,
    /// The provider sent something that could not be decoded.
    Malformed,
    /// Any other provider-defined code.
    Other(String),
}

impl ProviderErrorCode {
    /// Map an identity toolkit error message (`"CODE : detail"`) to a code.
    #[must_use]
    pub fn from_identity_message(message: &str) -> Self {
        let code = message.split(':').next().unwrap_or_default().trim();
        match code {
            "ADMIN_ONLY_OPERATION" => Self::AdminRestricted,
            "OPERATION_NOT_ALLOWED" => Self::OperationNotAllowed,
            "INVALID_CUSTOM_TOKEN"
            | "CREDENTIAL_MISMATCH"
            | "INVALID_IDP_RESPONSE"
            | "INVALID_ID_TOKEN"
            | "TOKEN_EXPIRED"
            | "USER_DISABLED" => Self::InvalidCredential,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An error returned by a provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
}

impl ProviderError {
    /// Create an error with a code and message.
    #[must_use]
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a network-level error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Network, message)
    }

    /// Create a permission error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::PermissionDenied, message)
    }

    /// Whether this error is expected during guest sign-in and must not be
    /// shown to the user.
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        matches!(
            self.code,
            ProviderErrorCode::AdminRestricted | ProviderErrorCode::OperationNotAllowed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_message_codes() {
        assert_eq!(
            ProviderErrorCode::from_identity_message("ADMIN_ONLY_OPERATION"),
            ProviderErrorCode::AdminRestricted
        );
        assert_eq!(
            ProviderErrorCode::from_identity_message(
                "OPERATION_NOT_ALLOWED : Anonymous user sign-in is disabled"
            ),
            ProviderErrorCode::OperationNotAllowed
        );
        assert_eq!(
            ProviderErrorCode::from_identity_message("INVALID_CUSTOM_TOKEN : bad"),
            ProviderErrorCode::InvalidCredential
        );
        assert_eq!(
            ProviderErrorCode::from_identity_message("QUOTA_EXCEEDED"),
            ProviderErrorCode::Other("QUOTA_EXCEEDED".to_string())
        );
    }

    #[test]
    fn test_suppressed_codes() {
        assert!(ProviderError::new(ProviderErrorCode::AdminRestricted, "x").is_suppressed());
        assert!(ProviderError::new(ProviderErrorCode::OperationNotAllowed, "x").is_suppressed());
        assert!(!ProviderError::network("offline").is_suppressed());
        assert!(!ProviderError::permission_denied("nope").is_suppressed());
    }

    #[test]
    fn test_display_is_message() {
        let err = ProviderError::permission_denied("Permission denied");
        assert_eq!(err.to_string(), "Permission denied");
    }
}

//! Error taxonomy shared by the service, stores, and protocol adapters.
//!
//! Adapters translate these into protocol responses (HTTP status or SOAP
//! fault); the raw variants never leave the process as diagnostic text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input, rejected before reaching the service.
    #[error("malformed input: {0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is suspended")]
    AccountSuspended,

    #[error("session has expired")]
    SessionExpired,

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("session not found")]
    SessionNotFound,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("secret does not meet the strength policy")]
    WeakSecret,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Unexpected internal failure (e.g. the hasher rejected its parameters).
    /// Clients see only the generic server-side response.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Only storage failures may be retried by a caller, and only for
    /// idempotent reads. Writes are never retried automatically.
    pub fn retryable(&self) -> bool {
        matches!(self, AuthError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(AuthError::Storage(sqlx::Error::PoolClosed).retryable());
        assert!(!AuthError::InvalidCredentials.retryable());
        assert!(!AuthError::SessionExpired.retryable());
        assert!(!AuthError::DuplicateUsername.retryable());
    }

    #[test]
    fn test_display_never_echoes_input_for_credential_errors() {
        // Credential failures must stay generic.
        assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid credentials");
    }
}

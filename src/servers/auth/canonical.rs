//! Transport-neutral request/response shared by both protocol adapters.
//!
//! Adapters produce a `CanonicalRequest` and consume a `CanonicalResponse`;
//! no XML or JSON artifact crosses this boundary in either direction.

use std::fmt;

use rand::RngExt;

use crate::database::account_db::AccountStatus;
use crate::error::AuthError;
use crate::session::SessionOrigin;

/// Short random id tying a request's log lines together.
pub fn correlation_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    hex::encode(bytes)
}

#[derive(Clone)]
pub enum Operation {
    Login { username: String, secret: String },
    Refresh { token: String },
    Logout { token: String },
    ProfileFetch { token: String },
    Register { username: String, secret: String, display_name: String },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Login { .. } => "login",
            Operation::Refresh { .. } => "refresh",
            Operation::Logout { .. } => "logout",
            Operation::ProfileFetch { .. } => "profile-fetch",
            Operation::Register { .. } => "register",
        }
    }
}

// Hand-written so secrets can never leak through debug logging.
impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("secret", &"<redacted>")
                .finish(),
            Operation::Refresh { token } => {
                f.debug_struct("Refresh").field("token", token).finish()
            }
            Operation::Logout { token } => {
                f.debug_struct("Logout").field("token", token).finish()
            }
            Operation::ProfileFetch { token } => {
                f.debug_struct("ProfileFetch").field("token", token).finish()
            }
            Operation::Register { username, display_name, .. } => f
                .debug_struct("Register")
                .field("username", username)
                .field("secret", &"<redacted>")
                .field("display_name", display_name)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub correlation_id: String,
    pub origin: SessionOrigin,
    pub op: Operation,
}

impl CanonicalRequest {
    pub fn new(origin: SessionOrigin, op: Operation) -> Self {
        Self {
            correlation_id: correlation_id(),
            origin,
            op,
        }
    }
}

/// Success payloads, one per operation outcome.
#[derive(Debug, Clone)]
pub enum Payload {
    SessionIssued {
        token: String,
        account_id: i64,
        expires_at: i64,
    },
    Refreshed {
        account_id: i64,
        expires_at: i64,
    },
    LoggedOut,
    Profile {
        account_id: i64,
        username: String,
        display_name: String,
        status: AccountStatus,
        created_at: i64,
        expires_at: i64,
    },
    Registered {
        account_id: i64,
    },
}

#[derive(Debug)]
pub struct CanonicalResponse {
    pub correlation_id: String,
    pub result: Result<Payload, AuthError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_shape() {
        let a = correlation_id();
        let b = correlation_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let op = Operation::Login {
            username: "alice".into(),
            secret: "S3cret!".into(),
        };
        let dump = format!("{:?}", op);
        assert!(dump.contains("alice"));
        assert!(!dump.contains("S3cret!"));

        let op = Operation::Register {
            username: "bob".into(),
            secret: "hunter2".into(),
            display_name: "Bob".into(),
        };
        let dump = format!("{:?}", op);
        assert!(!dump.contains("hunter2"));
    }

    #[test]
    fn test_operation_names_are_stable() {
        let op = Operation::ProfileFetch { token: "t".into() };
        assert_eq!(op.name(), "profile-fetch");
    }
}

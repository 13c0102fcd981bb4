//! Session registry
//!
//! Issues, validates, refreshes, and revokes the opaque tokens that stand for
//! an authenticated account. Sessions are persisted; the expiry check at
//! validation time is authoritative, the background sweep only reclaims rows.

use std::fmt;

use rand::RngExt;
use sqlx::SqlitePool;

use crate::config::ServerConfig;
use crate::database::session_db;
use crate::error::AuthError;

/// Raw token length in bytes before hex encoding.
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh session token: 32 CSPRNG bytes, hex-encoded (64 chars).
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; TOKEN_BYTES] = rng.random();
    hex::encode(bytes)
}

/// Which protocol adapter a session was issued through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Soap,
    Rest,
}

impl SessionOrigin {
    pub fn as_i64(self) -> i64 {
        match self {
            SessionOrigin::Soap => 0,
            SessionOrigin::Rest => 1,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        if v == 0 {
            SessionOrigin::Soap
        } else {
            SessionOrigin::Rest
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionOrigin::Soap => "soap",
            SessionOrigin::Rest => "rest",
        }
    }
}

impl fmt::Display for SessionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One session row. Timestamps are unix seconds.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub account_id: i64,
    pub origin: SessionOrigin,
    pub issued_at: i64,
    pub expires_at: i64,
    pub last_seen: i64,
    pub revoked: bool,
}

/// Expiry and concurrency policy, fixed at startup from the config.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub idle_secs: i64,
    pub max_secs: i64,
    pub sliding: bool,
    pub single_session: bool,
}

impl SessionPolicy {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            idle_secs: config.session_idle_secs as i64,
            max_secs: config.session_max_secs as i64,
            sliding: config.sliding_expiry,
            single_session: config.single_session,
        }
    }
}

pub struct SessionRegistry {
    pool: SqlitePool,
    policy: SessionPolicy,
}

impl SessionRegistry {
    pub fn new(pool: SqlitePool, policy: SessionPolicy) -> Self {
        Self { pool, policy }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Issue a fresh session. Under the single-session policy, live sessions
    /// for the same (account, origin) are revoked first, so at most one
    /// authoritative session exists per pair.
    pub async fn issue(
        &self,
        account_id: i64,
        origin: SessionOrigin,
    ) -> Result<Session, AuthError> {
        if self.policy.single_session {
            let displaced =
                session_db::revoke_for_account_origin(&self.pool, account_id, origin).await?;
            if displaced > 0 {
                tracing::debug!(
                    "[session] [displaced] account_id={} origin={} count={}",
                    account_id,
                    origin,
                    displaced
                );
            }
        }

        let now = Self::now();
        let session = Session {
            token: generate_token(),
            account_id,
            origin,
            issued_at: now,
            expires_at: now + self.policy.idle_secs.min(self.policy.max_secs),
            last_seen: now,
            revoked: false,
        };
        session_db::insert(&self.pool, &session).await?;

        tracing::debug!(
            "[session] [issued] account_id={} origin={} expires_at={}",
            account_id,
            origin,
            session.expires_at
        );
        Ok(session)
    }

    /// Resolve a token to its live session. "Past expiry" is decided here
    /// against the clock, whether or not the sweep has run.
    pub async fn validate(&self, token: &str) -> Result<Session, AuthError> {
        let Some(session) = session_db::get(&self.pool, token).await? else {
            return Err(AuthError::SessionNotFound);
        };
        if session.revoked {
            return Err(AuthError::SessionRevoked);
        }
        if session.expires_at <= Self::now() {
            return Err(AuthError::SessionExpired);
        }
        Ok(session)
    }

    /// Refresh last-seen; under a sliding policy the expiry extends to
    /// now + idle, never past issued_at + max lifetime.
    pub async fn touch(&self, token: &str) -> Result<Session, AuthError> {
        let session = self.validate(token).await?;

        let now = Self::now();
        let new_expires_at = if self.policy.sliding {
            (now + self.policy.idle_secs).min(session.issued_at + self.policy.max_secs)
        } else {
            session.expires_at
        };

        let updated = session_db::touch(&self.pool, token, now, new_expires_at).await?;
        if updated == 0 {
            // Lost a race with a concurrent revoke or with expiry; re-read to
            // report the precise reason.
            return match self.validate(token).await {
                Ok(_) => Err(AuthError::SessionNotFound),
                Err(e) => Err(e),
            };
        }

        Ok(Session {
            last_seen: now,
            expires_at: new_expires_at,
            ..session
        })
    }

    /// Revoke a token. Idempotent: revoking an unknown or already-revoked
    /// token is a no-op success.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let n = session_db::revoke(&self.pool, token).await?;
        if n == 0 {
            tracing::debug!("[session] [revoke_noop] token unknown or already revoked");
        }
        Ok(())
    }

    /// Revoke every live session an account holds, across both origins.
    pub async fn revoke_all_for_account(&self, account_id: i64) -> Result<u64, AuthError> {
        let n = session_db::revoke_all_for_account(&self.pool, account_id).await?;
        tracing::debug!("[session] [revoke_all] account_id={} count={}", account_id, n);
        Ok(n)
    }

    /// Reclaim rows past expiry. Runs on a timer; never required for
    /// correctness.
    pub async fn sweep_expired(&self) -> Result<u64, AuthError> {
        let n = session_db::delete_dead(&self.pool, Self::now()).await?;
        if n > 0 {
            tracing::debug!("[session] [sweep] removed={}", n);
        }
        Ok(n)
    }
}

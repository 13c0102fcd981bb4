//! The shared service core behind both protocol adapters.
//!
//! All policy lives here — credential checks, lockout, weak-secret rejection,
//! single-session enforcement, suspension — so SOAP and REST callers get
//! identical outcomes for identical inputs. Adapters never reach past this
//! module into the stores.

use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::SqlitePool;

use super::canonical::{CanonicalRequest, CanonicalResponse, Operation, Payload};
use super::password;
use crate::database::account_db::{self, Account, AccountStatus};
use crate::error::AuthError;
use crate::network::throttle::LoginThrottle;
use crate::session::{Session, SessionOrigin, SessionRegistry};

/// Usernames: 3-16 chars, ASCII letters, digits, underscore.
pub fn is_valid_username(s: &str) -> bool {
    (3..=16).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Everything an adapter may learn about an authenticated caller. The
/// password hash deliberately has no field here.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account_id: i64,
    pub username: String,
    pub display_name: String,
    pub status: AccountStatus,
    pub created_at: i64,
    pub session: Session,
}

pub struct AuthService {
    pool: SqlitePool,
    registry: SessionRegistry,
    throttle: LoginThrottle,
    min_secret_len: usize,
    logins: AtomicU64,
    logouts: AtomicU64,
}

impl AuthService {
    pub fn new(
        pool: SqlitePool,
        registry: SessionRegistry,
        throttle: LoginThrottle,
        min_secret_len: usize,
    ) -> Self {
        Self {
            pool,
            registry,
            throttle,
            min_secret_len,
            logins: AtomicU64::new(0),
            logouts: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Flush and close the store. Called once, after the listener has drained.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }

    pub fn logout_count(&self) -> u64 {
        self.logouts.load(Ordering::Relaxed)
    }

    pub async fn register(
        &self,
        username: &str,
        secret: &str,
        display_name: &str,
    ) -> Result<i64, AuthError> {
        if !is_valid_username(username) {
            return Err(AuthError::Validation("invalid username".into()));
        }
        if secret.len() < self.min_secret_len {
            return Err(AuthError::WeakSecret);
        }

        let hash = password::hash_secret(secret)?;
        let created_at = chrono::Utc::now().timestamp();
        let account_id =
            account_db::create(&self.pool, username, &hash, display_name, created_at).await?;

        tracing::info!("[auth] [registered] account_id={} username={}", account_id, username);
        Ok(account_id)
    }

    pub async fn login(
        &self,
        username: &str,
        secret: &str,
        origin: SessionOrigin,
    ) -> Result<Session, AuthError> {
        let key = username.to_lowercase();
        if self.throttle.is_locked(&key) {
            tracing::warn!("[auth] [login_locked] username={}", username);
            return Err(AuthError::InvalidCredentials);
        }

        let Some(account) = account_db::find_by_username(&self.pool, username).await? else {
            self.throttle.record_failure(&key);
            return Err(AuthError::InvalidCredentials);
        };

        match account.status {
            AccountStatus::Suspended => return Err(AuthError::AccountSuspended),
            // deleted accounts are indistinguishable from unknown ones
            AccountStatus::Deleted => {
                self.throttle.record_failure(&key);
                return Err(AuthError::InvalidCredentials);
            }
            AccountStatus::Active => {}
        }

        if !password::verify_secret(secret, &account.password_hash) {
            let fails = self.throttle.record_failure(&key);
            tracing::info!(
                "[auth] [login_failed] account_id={} fails={}",
                account.account_id,
                fails
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.throttle.clear(&key);
        let session = self.registry.issue(account.account_id, origin).await?;
        self.logins.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "[auth] [login_ok] account_id={} origin={}",
            account.account_id,
            origin
        );
        Ok(session)
    }

    /// Resolve a token to its account. Refreshes last-seen as a side effect;
    /// a suspension that happened after issue still denies access here.
    pub async fn authenticate(&self, token: &str) -> Result<AccountContext, AuthError> {
        let session = self.registry.touch(token).await?;

        let account = account_db::find_by_id(&self.pool, session.account_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if account.status == AccountStatus::Suspended {
            return Err(AuthError::AccountSuspended);
        }

        Ok(account_context(account, session))
    }

    /// Refresh a session's last-seen/expiry without loading the account.
    pub async fn refresh(&self, token: &str) -> Result<Session, AuthError> {
        self.registry.touch(token).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.registry.revoke(token).await?;
        self.logouts.fetch_add(1, Ordering::Relaxed);
        tracing::info!("[auth] [logout]");
        Ok(())
    }

    pub async fn change_password(
        &self,
        username: &str,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<(), AuthError> {
        let Some(account) = account_db::find_by_username(&self.pool, username).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if account.status != AccountStatus::Active {
            return Err(AuthError::InvalidCredentials);
        }
        if !password::verify_secret(old_secret, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if new_secret.len() < self.min_secret_len {
            return Err(AuthError::WeakSecret);
        }

        let hash = password::hash_secret(new_secret)?;
        account_db::update_password_hash(&self.pool, account.account_id, &hash).await?;
        tracing::info!("[auth] [password_changed] account_id={}", account.account_id);
        Ok(())
    }

    /// Operator status change. Leaving the active state revokes every live
    /// session the account holds; returns the number revoked.
    pub async fn set_account_status(
        &self,
        username: &str,
        status: AccountStatus,
    ) -> Result<u64, AuthError> {
        let Some(account) = account_db::find_by_username(&self.pool, username).await? else {
            return Err(AuthError::Validation("unknown account".into()));
        };

        account_db::set_status(&self.pool, account.account_id, status).await?;
        let revoked = if status == AccountStatus::Active {
            0
        } else {
            self.registry.revoke_all_for_account(account.account_id).await?
        };

        tracing::info!(
            "[auth] [status_changed] account_id={} status={} revoked={}",
            account.account_id,
            status.as_str(),
            revoked
        );
        Ok(revoked)
    }

    /// The single entry point both adapters call.
    pub async fn dispatch(&self, req: CanonicalRequest) -> CanonicalResponse {
        let CanonicalRequest {
            correlation_id,
            origin,
            op,
        } = req;
        tracing::debug!(
            "[auth] [dispatch] corr={} origin={} op={}",
            correlation_id,
            origin,
            op.name()
        );

        let op_name = op.name();
        let result = match op {
            Operation::Login { username, secret } => self
                .login(&username, &secret, origin)
                .await
                .map(|s| Payload::SessionIssued {
                    token: s.token,
                    account_id: s.account_id,
                    expires_at: s.expires_at,
                }),
            Operation::Refresh { token } => {
                self.refresh(&token).await.map(|s| Payload::Refreshed {
                    account_id: s.account_id,
                    expires_at: s.expires_at,
                })
            }
            Operation::Logout { token } => self.logout(&token).await.map(|()| Payload::LoggedOut),
            Operation::ProfileFetch { token } => {
                self.authenticate(&token).await.map(|ctx| Payload::Profile {
                    account_id: ctx.account_id,
                    username: ctx.username,
                    display_name: ctx.display_name,
                    status: ctx.status,
                    created_at: ctx.created_at,
                    expires_at: ctx.session.expires_at,
                })
            }
            Operation::Register {
                username,
                secret,
                display_name,
            } => self
                .register(&username, &secret, &display_name)
                .await
                .map(|account_id| Payload::Registered { account_id }),
        };

        if let Err(e) = &result {
            tracing::debug!(
                "[auth] [dispatch_failed] corr={} op={} err={}",
                correlation_id,
                op_name,
                e
            );
        }
        CanonicalResponse {
            correlation_id,
            result,
        }
    }
}

fn account_context(account: Account, session: Session) -> AccountContext {
    AccountContext {
        account_id: account.account_id,
        username: account.username,
        display_name: account.display_name,
        status: account.status,
        created_at: account.created_at,
        session,
    }
}

pub mod canonical;
pub mod envelope;
pub mod password;
pub mod rest;
pub mod service;
pub mod soap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::AuthError;
use crate::network::throttle::LoginThrottle;
use crate::session::{SessionPolicy, SessionRegistry};
use service::AuthService;

/// The 10 localised fault messages sent to legacy clients, indexed by FLT_*
/// constants.
#[derive(Debug, Clone)]
pub struct FaultMessages(pub [String; 10]);

// Message key indices — one per client-visible failure kind
pub const FLT_ERRSERVER: usize = 0;
pub const FLT_WRONGPASS: usize = 1;
pub const FLT_SUSPENDED: usize = 2;
pub const FLT_ERRDB:     usize = 3;
pub const FLT_USEREXIST: usize = 4;
pub const FLT_ERRPASS:   usize = 5;
pub const FLT_ERRUSER:   usize = 6;
pub const FLT_EXPIRED:   usize = 7;
pub const FLT_REVOKED:   usize = 8;
pub const FLT_NOSESSION: usize = 9;

impl Default for FaultMessages {
    fn default() -> Self {
        let mut msgs: [String; 10] = Default::default();
        msgs[FLT_ERRSERVER] = "Server error".into();
        msgs[FLT_WRONGPASS] = "Invalid username or password".into();
        msgs[FLT_SUSPENDED] = "Account is suspended".into();
        msgs[FLT_ERRDB]     = "Database error".into();
        msgs[FLT_USEREXIST] = "User already exists".into();
        msgs[FLT_ERRPASS]   = "Bad password format".into();
        msgs[FLT_ERRUSER]   = "Bad request format".into();
        msgs[FLT_EXPIRED]   = "Session has expired".into();
        msgs[FLT_REVOKED]   = "Session has been revoked".into();
        msgs[FLT_NOSESSION] = "Unknown session".into();
        FaultMessages(msgs)
    }
}

/// Parses a `key: value` fault file (same format as the legacy lang files).
/// Lines starting with `//` are comments. Unknown keys are silently ignored;
/// keys not present keep their built-in message.
pub fn parse_fault_file(content: &str) -> Result<FaultMessages> {
    let mut msgs = FaultMessages::default();
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with("//") || line.is_empty() {
            continue;
        }
        if let Some((key, val)) = line.split_once(':') {
            let val = val.trim().to_string();
            match key.trim().to_ascii_uppercase().as_str() {
                "FLT_ERRSERVER" => msgs.0[FLT_ERRSERVER] = val,
                "FLT_WRONGPASS" => msgs.0[FLT_WRONGPASS] = val,
                "FLT_SUSPENDED" => msgs.0[FLT_SUSPENDED] = val,
                "FLT_ERRDB"     => msgs.0[FLT_ERRDB]     = val,
                "FLT_USEREXIST" => msgs.0[FLT_USEREXIST] = val,
                "FLT_ERRPASS"   => msgs.0[FLT_ERRPASS]   = val,
                "FLT_ERRUSER"   => msgs.0[FLT_ERRUSER]   = val,
                "FLT_EXPIRED"   => msgs.0[FLT_EXPIRED]   = val,
                "FLT_REVOKED"   => msgs.0[FLT_REVOKED]   = val,
                "FLT_NOSESSION" => msgs.0[FLT_NOSESSION] = val,
                _ => {}
            }
        }
    }
    Ok(msgs)
}

/// Map a service error to the legacy (faultcode, faultstring) pair. Anything
/// not explicitly mapped falls back to the generic server fault.
pub fn fault_for<'a>(err: &AuthError, msgs: &'a FaultMessages) -> (&'static str, &'a str) {
    match err {
        AuthError::Validation(_) => ("Client", msgs.0[FLT_ERRUSER].as_str()),
        AuthError::InvalidCredentials => ("Client", msgs.0[FLT_WRONGPASS].as_str()),
        AuthError::AccountSuspended => ("Client", msgs.0[FLT_SUSPENDED].as_str()),
        AuthError::SessionExpired => ("Client", msgs.0[FLT_EXPIRED].as_str()),
        AuthError::SessionRevoked => ("Client", msgs.0[FLT_REVOKED].as_str()),
        AuthError::SessionNotFound => ("Client", msgs.0[FLT_NOSESSION].as_str()),
        AuthError::DuplicateUsername => ("Client", msgs.0[FLT_USEREXIST].as_str()),
        AuthError::WeakSecret => ("Client", msgs.0[FLT_ERRPASS].as_str()),
        AuthError::Storage(_) => ("Server", msgs.0[FLT_ERRDB].as_str()),
        _ => ("Server", msgs.0[FLT_ERRSERVER].as_str()),
    }
}

pub struct AuthState {
    pub config: ServerConfig,
    pub service: AuthService,
    pub faults: FaultMessages,
}

impl AuthState {
    pub fn new(pool: SqlitePool, config: ServerConfig, faults: FaultMessages) -> Self {
        let registry = SessionRegistry::new(pool.clone(), SessionPolicy::from_config(&config));
        let throttle = LoginThrottle::new(
            config.lockout_threshold,
            Duration::from_secs(config.lockout_secs),
        );
        let service = AuthService::new(pool, registry, throttle, config.min_secret_len);
        Self {
            config,
            service,
            faults,
        }
    }

    /// The dispatcher: the path picks the adapter, and anything unroutable is
    /// answered 404 without reaching the service.
    pub fn router(state: Arc<AuthState>) -> Router {
        Router::new()
            .route("/AuthService/AuthService.asmx", post(soap::soap_handler))
            .route("/health", get(rest::health))
            .route("/login", post(rest::login))
            .route("/logout", post(rest::logout))
            .route("/register", post(rest::register))
            .route("/session", get(rest::session))
            .route("/password", post(rest::change_password))
            .route("/accounts/{username}/status", post(rest::set_status))
            .with_state(state)
    }

    pub async fn run(state: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        tracing::info!("[auth] [ready] addr={}", bind_addr);

        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&state)));

        let app = Self::router(Arc::clone(&state));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // In-flight requests have drained; stop the sweeper and flush the store.
        sweeper.abort();
        state.service.close().await;
        tracing::info!("[auth] [stopped] listener closed, store flushed");
        Ok(())
    }
}

async fn sweep_loop(state: Arc<AuthState>) {
    let interval = Duration::from_secs(state.config.sweep_interval_secs);
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = state.service.registry().sweep_expired().await {
            tracing::warn!("[auth] [sweep_failed] {}", e);
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("[auth] [shutdown] signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
// Auth server fault file
FLT_ERRSERVER: Server on fire
FLT_WRONGPASS: Wrong password
FLT_EXPIRED: Come back tomorrow
"#;

    #[test]
    fn test_parse_fault_file_overrides_listed_keys() {
        let msgs = parse_fault_file(FIXTURE).unwrap();
        assert_eq!(msgs.0[FLT_ERRSERVER], "Server on fire");
        assert_eq!(msgs.0[FLT_WRONGPASS], "Wrong password");
        assert_eq!(msgs.0[FLT_EXPIRED], "Come back tomorrow");
        // unlisted keys keep the built-in message
        assert_eq!(msgs.0[FLT_USEREXIST], "User already exists");
    }

    #[test]
    fn test_parse_fault_file_ignores_comments_and_unknown_keys() {
        let msgs = parse_fault_file("// comment\nFLT_BOGUS: x\nFLT_REVOKED: gone").unwrap();
        assert_eq!(msgs.0[FLT_REVOKED], "gone");
    }

    #[test]
    fn test_fault_for_maps_client_and_server_sides() {
        let msgs = FaultMessages::default();

        let (code, msg) = fault_for(&AuthError::InvalidCredentials, &msgs);
        assert_eq!(code, "Client");
        assert_eq!(msg, msgs.0[FLT_WRONGPASS]);

        let (code, _) = fault_for(&AuthError::Storage(sqlx::Error::PoolClosed), &msgs);
        assert_eq!(code, "Server");

        // unknown/internal kinds fail closed to the generic server fault
        let (code, msg) = fault_for(&AuthError::Internal("boom".into()), &msgs);
        assert_eq!(code, "Server");
        assert_eq!(msg, msgs.0[FLT_ERRSERVER]);
    }
}

//! REST adapter: the JSON surface for operators, health checks, and tooling.
//!
//! Thin translation layer only — every request becomes the same canonical
//! shape the SOAP adapter produces, so outcomes match across protocols.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::canonical::{CanonicalRequest, Operation, Payload};
use super::AuthState;
use crate::database::account_db::AccountStatus;
use crate::error::AuthError;
use crate::session::SessionOrigin;

fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials
        | AuthError::SessionExpired
        | AuthError::SessionRevoked
        | AuthError::SessionNotFound => StatusCode::UNAUTHORIZED,
        AuthError::AccountSuspended => StatusCode::FORBIDDEN,
        AuthError::DuplicateUsername => StatusCode::CONFLICT,
        AuthError::WeakSecret => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Stable machine-readable slugs; raw error internals stay inside.
fn error_slug(err: &AuthError) -> &'static str {
    match err {
        AuthError::Validation(_) => "bad_request",
        AuthError::InvalidCredentials => "invalid_credentials",
        AuthError::AccountSuspended => "account_suspended",
        AuthError::SessionExpired => "session_expired",
        AuthError::SessionRevoked => "session_revoked",
        AuthError::SessionNotFound => "session_not_found",
        AuthError::DuplicateUsername => "duplicate_username",
        AuthError::WeakSecret => "weak_secret",
        AuthError::Storage(_) => "storage_error",
        AuthError::Internal(_) => "internal_error",
    }
}

fn error_response(err: &AuthError) -> Response {
    (
        status_for(err),
        Json(json!({ "status": "error", "error": error_slug(err) })),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing_token() -> Response {
    error_response(&AuthError::Validation("missing bearer token".into()))
}

pub async fn health(State(state): State<Arc<AuthState>>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "logins": state.service.login_count(),
            "logouts": state.service.logout_count(),
        })),
    )
        .into_response()
}

// No Debug derives on secret-bearing payloads; they must never be printable.
#[derive(Deserialize)]
pub struct LoginPayload {
    username: String,
    password: String,
}

pub async fn login(
    State(state): State<Arc<AuthState>>,
    Json(payload): Json<LoginPayload>,
) -> Response {
    let response = state
        .service
        .dispatch(CanonicalRequest::new(
            SessionOrigin::Rest,
            Operation::Login {
                username: payload.username,
                secret: payload.password,
            },
        ))
        .await;

    match response.result {
        Ok(Payload::SessionIssued {
            token,
            account_id,
            expires_at,
        }) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "token": token,
                "account_id": account_id,
                "expires_at": expires_at,
            })),
        )
            .into_response(),
        Ok(_) => error_response(&AuthError::Internal("unexpected payload".into())),
        Err(e) => error_response(&e),
    }
}

pub async fn logout(State(state): State<Arc<AuthState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return missing_token();
    };

    let response = state
        .service
        .dispatch(CanonicalRequest::new(
            SessionOrigin::Rest,
            Operation::Logout { token },
        ))
        .await;

    match response.result {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    username: String,
    password: String,
    #[serde(default)]
    display_name: String,
}

pub async fn register(
    State(state): State<Arc<AuthState>>,
    Json(payload): Json<RegisterPayload>,
) -> Response {
    let response = state
        .service
        .dispatch(CanonicalRequest::new(
            SessionOrigin::Rest,
            Operation::Register {
                username: payload.username,
                secret: payload.password,
                display_name: payload.display_name,
            },
        ))
        .await;

    match response.result {
        Ok(Payload::Registered { account_id }) => (
            StatusCode::CREATED,
            Json(json!({ "status": "ok", "account_id": account_id })),
        )
            .into_response(),
        Ok(_) => error_response(&AuthError::Internal("unexpected payload".into())),
        Err(e) => error_response(&e),
    }
}

/// GET /session — validate the bearer token and describe its account.
pub async fn session(State(state): State<Arc<AuthState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return missing_token();
    };

    let response = state
        .service
        .dispatch(CanonicalRequest::new(
            SessionOrigin::Rest,
            Operation::ProfileFetch { token },
        ))
        .await;

    match response.result {
        Ok(Payload::Profile {
            account_id,
            username,
            display_name,
            status,
            created_at,
            expires_at,
        }) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "account_id": account_id,
                "username": username,
                "display_name": display_name,
                "account_status": status.as_str(),
                "created_at": created_at,
                "expires_at": expires_at,
            })),
        )
            .into_response(),
        Ok(_) => error_response(&AuthError::Internal("unexpected payload".into())),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
pub struct PasswordPayload {
    username: String,
    old_password: String,
    new_password: String,
}

pub async fn change_password(
    State(state): State<Arc<AuthState>>,
    Json(payload): Json<PasswordPayload>,
) -> Response {
    match state
        .service
        .change_password(&payload.username, &payload.old_password, &payload.new_password)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    status: String,
}

/// POST /accounts/{username}/status — operator suspension tooling.
pub async fn set_status(
    State(state): State<Arc<AuthState>>,
    Path(username): Path<String>,
    Json(payload): Json<StatusPayload>,
) -> Response {
    let Some(status) = AccountStatus::parse(&payload.status) else {
        return error_response(&AuthError::Validation("unknown status".into()));
    };

    match state.service.set_account_status(&username, status).await {
        Ok(revoked) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "revoked": revoked })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_follows_failure_taxonomy() {
        assert_eq!(status_for(&AuthError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthError::SessionExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthError::SessionRevoked), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthError::SessionNotFound), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthError::AccountSuspended), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&AuthError::DuplicateUsername), StatusCode::CONFLICT);
        assert_eq!(status_for(&AuthError::WeakSecret), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_for(&AuthError::Storage(sqlx::Error::PoolClosed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_slugs_are_stable() {
        assert_eq!(error_slug(&AuthError::InvalidCredentials), "invalid_credentials");
        assert_eq!(error_slug(&AuthError::DuplicateUsername), "duplicate_username");
        assert_eq!(
            error_slug(&AuthError::Storage(sqlx::Error::PoolClosed)),
            "storage_error"
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123".into()));

        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}

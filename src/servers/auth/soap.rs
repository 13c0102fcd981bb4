//! SOAP adapter: the legacy game-client surface.
//!
//! One endpoint, routed by SOAPAction header or body operation element (the
//! original client sets both, not always consistently). Envelopes become
//! canonical requests; service failures become faults from the configured
//! fault table. A malformed envelope rejects only that request.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::canonical::{CanonicalRequest, Operation, Payload};
use super::envelope::{self, SoapOperation};
use super::{fault_for, AuthState, FLT_ERRUSER};
use crate::session::SessionOrigin;

const CONTENT_TYPE_XML: &str = "text/xml; charset=utf-8";

pub async fn soap_handler(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let action = headers
        .get("SOAPAction")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim_matches('"')
        .to_string();
    tracing::debug!("[soap] [request] action={}", action);

    let op = match envelope::extract_operation(&body) {
        Ok(op) => op,
        Err(e) => {
            tracing::warn!("[soap] [bad_envelope] {}", e);
            return xml_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope::build_fault("Client", &state.faults.0[FLT_ERRUSER]),
            );
        }
    };

    let canonical_op = match to_canonical(&action, &op) {
        Ok(canonical_op) => canonical_op,
        Err(fault) => {
            tracing::warn!("[soap] [unroutable] op={}", op.name);
            return xml_response(StatusCode::INTERNAL_SERVER_ERROR, fault);
        }
    };

    let response = state
        .service
        .dispatch(CanonicalRequest::new(SessionOrigin::Soap, canonical_op))
        .await;

    match response.result {
        Ok(payload) => xml_response(
            StatusCode::OK,
            envelope::wrap_envelope(&render_payload(payload)),
        ),
        Err(e) => {
            let (code, msg) = fault_for(&e, &state.faults);
            xml_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope::build_fault(code, msg),
            )
        }
    }
}

/// Route by SOAPAction or operation element, and pull the typed fields out of
/// the flat parameter list. Unknown operations fail closed with a client
/// fault.
fn to_canonical(action: &str, op: &SoapOperation) -> Result<Operation, String> {
    let is = |name: &str| action.contains(name) || op.name == name;

    if is("Login") {
        Ok(Operation::Login {
            username: require_param(op, "Username")?,
            secret: require_param(op, "Password")?,
        })
    } else if is("RefreshSession") {
        Ok(Operation::Refresh {
            token: require_param(op, "Token")?,
        })
    } else if is("Logout") {
        Ok(Operation::Logout {
            token: require_param(op, "Token")?,
        })
    } else if is("GetProfile") {
        Ok(Operation::ProfileFetch {
            token: require_param(op, "Token")?,
        })
    } else {
        Err(envelope::build_fault("Client", "Unknown operation"))
    }
}

fn require_param(op: &SoapOperation, name: &str) -> Result<String, String> {
    match op.param(name) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(envelope::build_fault(
            "Client",
            &format!("Missing element: {name}"),
        )),
    }
}

fn render_payload(payload: Payload) -> String {
    match payload {
        Payload::SessionIssued {
            token,
            account_id,
            expires_at,
        } => envelope::build_response(
            "Login",
            "Success",
            &[
                ("Token", token.as_str()),
                ("AccountId", &account_id.to_string()),
                ("Expiry", &format_expiry(expires_at)),
            ],
        ),
        Payload::Refreshed { expires_at, .. } => envelope::build_response(
            "RefreshSession",
            "Success",
            &[("Expiry", format_expiry(expires_at).as_str())],
        ),
        Payload::LoggedOut => envelope::build_response("Logout", "Success", &[]),
        Payload::Profile {
            account_id,
            username,
            display_name,
            status,
            created_at,
            expires_at,
        } => envelope::build_response(
            "GetProfile",
            "Success",
            &[
                ("AccountId", &account_id.to_string()),
                ("Username", username.as_str()),
                ("DisplayName", display_name.as_str()),
                ("Status", status.as_str()),
                ("Created", &format_expiry(created_at)),
                ("Expiry", &format_expiry(expires_at)),
            ],
        ),
        // not reachable over SOAP (registration is REST-only), rendered for
        // completeness
        Payload::Registered { account_id } => envelope::build_response(
            "Register",
            "Success",
            &[("AccountId", account_id.to_string().as_str())],
        ),
    }
}

/// Timestamp format the legacy client parses: `%Y-%m-%dT%H:%M:%SZ`.
fn format_expiry(unix_secs: i64) -> String {
    chrono::DateTime::from_timestamp(unix_secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_default()
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, CONTENT_TYPE_XML)], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, params: &[(&str, &str)]) -> SoapOperation {
        let body: String = params
            .iter()
            .map(|(k, v)| format!("<{k}>{v}</{k}>"))
            .collect();
        let xml = format!("<E><Body><{name}>{body}</{name}></Body></E>");
        envelope::extract_operation(&xml).unwrap()
    }

    #[test]
    fn test_routing_by_body_element() {
        let canonical = to_canonical("", &op("Login", &[("Username", "a"), ("Password", "b")]));
        assert!(matches!(canonical, Ok(Operation::Login { .. })));
    }

    #[test]
    fn test_routing_by_soap_action() {
        // body element name unknown, action decides
        let parsed = op("Whatever", &[("Token", "t")]);
        let canonical =
            to_canonical("http://gamespy.net/AuthService/RefreshSession", &parsed);
        assert!(matches!(canonical, Ok(Operation::Refresh { .. })));
    }

    #[test]
    fn test_unknown_operation_fails_closed() {
        let fault = to_canonical("", &op("FormatDisk", &[])).unwrap_err();
        assert!(fault.contains("soap:Client"));
        assert!(fault.contains("Unknown operation"));
    }

    #[test]
    fn test_missing_param_is_client_fault() {
        let fault = to_canonical("", &op("Login", &[("Username", "a")])).unwrap_err();
        assert!(fault.contains("Missing element: Password"));
    }

    #[test]
    fn test_expiry_format_matches_legacy_client() {
        assert_eq!(format_expiry(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_expiry(1_700_000_000), "2023-11-14T22:13:20Z");
    }
}

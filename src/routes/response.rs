//! Shared response and request helpers for the route handlers

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::auth::{extract_token_from_header, JwtValidator};
use crate::types::{GatewayError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest JSON body any route accepts
pub const MAX_JSON_BODY_BYTES: usize = 64 * 1024;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// JSON response with permissive CORS headers
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    raw_json_response(status, Bytes::from(json))
}

/// Already-serialized JSON, passed through untouched
pub fn raw_json_response(status: StatusCode, body: Bytes) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(body))
        .unwrap()
}

pub fn error_response(err: &GatewayError) -> Response<BoxBody> {
    json_response(err.status_code(), &err.to_body())
}

/// Error response whose 500 message names the failed operation
pub fn route_error_response(err: &GatewayError, failure_message: &str) -> Response<BoxBody> {
    let mut body = err.to_body();
    if err.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
        body.message = failure_message.to_string();
    }
    json_response(err.status_code(), &body)
}

/// Log a failed request with its route and caller, then build the response
pub fn log_and_respond(route: &str, identity: Option<&ObjectId>, err: &GatewayError) -> Response<BoxBody> {
    log_failure(route, identity, err);
    error_response(err)
}

/// As [`log_and_respond`], with the 500 message naming the failed operation
pub fn log_and_respond_with(
    route: &str,
    identity: Option<&ObjectId>,
    err: &GatewayError,
    failure_message: &str,
) -> Response<BoxBody> {
    log_failure(route, identity, err);
    route_error_response(err, failure_message)
}

// Server-side failures log at error level, caller mistakes at warn
fn log_failure(route: &str, identity: Option<&ObjectId>, err: &GatewayError) {
    let identity = identity.map(|id| id.to_hex()).unwrap_or_else(|| "-".to_string());
    if err.status_code().is_server_error() {
        error!(route = route, identity = %identity, code = err.code(), error = %err, "Request failed");
    } else {
        warn!(route = route, identity = %identity, code = err.code(), error = %err, "Request rejected");
    }
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "message": format!("No route for {}", path),
            "code": "NOT_FOUND",
        }),
    )
}

/// Read a whole body, rejecting anything larger than `limit`
pub async fn read_body(req: Request<Incoming>, limit: usize) -> Result<Bytes> {
    let collected = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| GatewayError::Validation(format!("Failed to read body: {}", e)))?;

    Ok(collected.to_bytes())
}

pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(req: Request<Incoming>) -> Result<T> {
    let bytes = read_body(req, MAX_JSON_BODY_BYTES).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Verify the caller's bearer token and return their identity id
pub fn authenticate(req: &Request<Incoming>, jwt: &JwtValidator) -> Result<ObjectId> {
    let token = extract_token_from_header(get_auth_header(req))
        .ok_or_else(|| GatewayError::Unauthenticated("No token provided".into()))?;

    let claims = jwt.verify_token(token)?;

    ObjectId::parse_str(&claims.sub)
        .map_err(|_| GatewayError::Unauthenticated("Invalid token subject".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::capture_logs;

    fn capture<R>(f: impl FnOnce() -> R) -> (R, String) {
        let (logs, guard) = capture_logs();
        let result = f();
        drop(guard);
        (result, logs.text())
    }

    #[test]
    fn test_log_and_respond_records_route_and_identity() {
        let identity = ObjectId::new();
        let err = GatewayError::Upstream("prediction service unreachable".into());

        let (response, logs) =
            capture(|| log_and_respond_with("yield/predict", Some(&identity), &err, "Yield prediction failed"));

        assert_eq!(response.status(), err.status_code());
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("yield/predict"));
        assert!(logs.contains(&identity.to_hex()));
        assert!(logs.contains("prediction service unreachable"));
    }

    #[test]
    fn test_log_and_respond_warns_on_rejected_caller() {
        let err = GatewayError::Unauthenticated("No token provided".into());

        let (response, logs) = capture(|| log_and_respond("auth/me", None, &err));

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("auth/me"));
        assert!(logs.contains("No token provided"));
        assert!(!logs.contains("ERROR"));
    }

    #[test]
    fn test_log_and_respond_keeps_internal_detail_in_logs() {
        let err = GatewayError::Persistence("insert failed".into());

        let (response, logs) =
            capture(|| log_and_respond_with("dashboard/overview", None, &err, "Failed to load dashboard"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(logs.contains("PERSISTENCE_FAILURE"));
        assert!(logs.contains("insert failed"));
    }
}

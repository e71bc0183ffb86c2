//! HTTP routes for authentication
//!
//! - POST /auth/register - Create an identity and get a JWT token
//! - POST /auth/login    - Authenticate and get a JWT token
//! - GET  /auth/me       - Profile of the token's identity

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::routes::response::{
    authenticate, cors_preflight, json_response, log_and_respond, parse_json_body, BoxBody,
};
use crate::server::AppState;
use crate::services::{LoginInput, RegisterInput};

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /auth/register
///
/// 201 with a token on success, 409 when the phone is taken.
async fn handle_register(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let input: RegisterInput = match parse_json_body(req).await {
        Ok(input) => input,
        Err(e) => return log_and_respond("auth/register", None, &e),
    };

    match state.credentials.register(input).await {
        Ok(auth) => json_response(StatusCode::CREATED, &auth),
        Err(e) => log_and_respond("auth/register", None, &e),
    }
}

/// POST /auth/login
async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let input: LoginInput = match parse_json_body(req).await {
        Ok(input) => input,
        Err(e) => return log_and_respond("auth/login", None, &e),
    };

    match state.credentials.login(input).await {
        Ok(auth) => json_response(StatusCode::OK, &auth),
        Err(e) => log_and_respond("auth/login", None, &e),
    }
}

/// GET /auth/me
async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state.jwt) {
        Ok(id) => id,
        Err(e) => return log_and_respond("auth/me", None, &e),
    };

    match state.credentials.profile(&identity).await {
        Ok(profile) => json_response(StatusCode::OK, &profile),
        Err(e) => log_and_respond("auth/me", Some(&identity), &e),
    }
}

// =============================================================================
// Router
// =============================================================================

/// Handle `/auth/*`. Returns None for paths this module does not serve.
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>> {
    if !path.starts_with("/auth") {
        return None;
    }

    let method = req.method().clone();
    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, path) {
        (Method::POST, "/auth/register") => handle_register(req, state).await,
        (Method::POST, "/auth/login") => handle_login(req, state).await,
        (Method::GET, "/auth/me") => handle_me(req, state).await,
        _ => return None,
    };

    Some(response)
}

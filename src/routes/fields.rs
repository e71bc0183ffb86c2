//! Field and crop registry routes
//!
//! - POST /fields              - Create a field
//! - GET  /fields              - List the caller's fields
//! - POST /fields/{id}/crops   - Register a crop on an owned field

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::routes::response::{authenticate, json_response, log_and_respond, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::services::{CreateCropInput, CreateFieldInput};

async fn handle_create_field(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state.jwt) {
        Ok(id) => id,
        Err(e) => return log_and_respond("fields/create", None, &e),
    };

    let input: CreateFieldInput = match parse_json_body(req).await {
        Ok(input) => input,
        Err(e) => return log_and_respond("fields/create", Some(&identity), &e),
    };

    match state.fields.create_field(identity, input).await {
        Ok(field) => json_response(StatusCode::CREATED, &field),
        Err(e) => log_and_respond("fields/create", Some(&identity), &e),
    }
}

async fn handle_list_fields(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state.jwt) {
        Ok(id) => id,
        Err(e) => return log_and_respond("fields/list", None, &e),
    };

    match state.fields.list_fields(&identity).await {
        Ok(fields) => json_response(StatusCode::OK, &fields),
        Err(e) => log_and_respond("fields/list", Some(&identity), &e),
    }
}

async fn handle_add_crop(
    req: Request<Incoming>,
    state: Arc<AppState>,
    field_id: &str,
) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state.jwt) {
        Ok(id) => id,
        Err(e) => return log_and_respond("fields/crops", None, &e),
    };

    let input: CreateCropInput = match parse_json_body(req).await {
        Ok(input) => input,
        Err(e) => return log_and_respond("fields/crops", Some(&identity), &e),
    };

    match state.fields.add_crop(&identity, field_id, input).await {
        Ok(crop) => json_response(StatusCode::CREATED, &crop),
        Err(e) => log_and_respond("fields/crops", Some(&identity), &e),
    }
}

/// Handle `/fields` and `/fields/{id}/crops`
pub async fn handle_fields_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>> {
    let method = req.method().clone();

    if path == "/fields" {
        return match method {
            Method::POST => Some(handle_create_field(req, state).await),
            Method::GET => Some(handle_list_fields(req, state).await),
            _ => None,
        };
    }

    let field_id = path
        .strip_prefix("/fields/")
        .and_then(|rest| rest.strip_suffix("/crops"))
        .filter(|id| !id.is_empty() && !id.contains('/'))?;

    if method == Method::POST {
        Some(handle_add_crop(req, state, field_id).await)
    } else {
        None
    }
}

//! POST /yield/predict
//!
//! JSON yield request relayed unmodified to the prediction service.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use crate::routes::response::{
    authenticate, log_and_respond_with, raw_json_response, read_body, BoxBody, MAX_JSON_BODY_BYTES,
};
use crate::server::AppState;
use crate::services::relay::YIELD_ROUTE;
use crate::services::YieldRequest;
use crate::types::GatewayError;

const FAILURE_MESSAGE: &str = "Yield prediction failed";

pub async fn handle_predict_yield(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state.jwt) {
        Ok(id) => id,
        Err(e) => return log_and_respond_with(YIELD_ROUTE, None, &e, FAILURE_MESSAGE),
    };

    let payload = match read_body(req, MAX_JSON_BODY_BYTES).await {
        Ok(payload) => payload,
        Err(e) => return log_and_respond_with(YIELD_ROUTE, Some(&identity), &e, FAILURE_MESSAGE),
    };

    // Validated from a parsed copy; the raw bytes are what gets forwarded
    let request = match serde_json::from_slice::<Value>(&payload)
        .map_err(GatewayError::from)
        .and_then(|value| YieldRequest::from_payload(&value))
    {
        Ok(request) => request,
        Err(e) => return log_and_respond_with(YIELD_ROUTE, Some(&identity), &e, FAILURE_MESSAGE),
    };

    match state.relay.predict_yield(identity, request, payload).await {
        Ok(body) => raw_json_response(StatusCode::OK, body),
        Err(e) => log_and_respond_with(YIELD_ROUTE, Some(&identity), &e, FAILURE_MESSAGE),
    }
}

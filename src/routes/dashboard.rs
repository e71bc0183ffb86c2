//! GET /dashboard/overview

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

use crate::routes::response::{authenticate, json_response, log_and_respond_with, BoxBody};
use crate::server::AppState;

const ROUTE: &str = "dashboard/overview";
const FAILURE_MESSAGE: &str = "Failed to load dashboard";

pub async fn handle_overview(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state.jwt) {
        Ok(id) => id,
        Err(e) => return log_and_respond_with(ROUTE, None, &e, FAILURE_MESSAGE),
    };

    match state.dashboard.overview(&identity).await {
        Ok(overview) => json_response(StatusCode::OK, &overview),
        Err(e) => log_and_respond_with(ROUTE, Some(&identity), &e, FAILURE_MESSAGE),
    }
}

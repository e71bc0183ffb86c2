//! Operational endpoints
//!
//! - GET /        - Liveness banner
//! - GET /health  - Liveness probe with uptime and storage backend
//! - GET /version - Build information for deployment verification

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::response::{json_response, BoxBody};
use crate::server::AppState;

pub const BANNER: &str = "AgroSense API running";

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub storage: &'static str,
    #[serde(rename = "devMode")]
    pub dev_mode: bool,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    #[serde(rename = "commitFull")]
    pub commit_full: &'static str,
    #[serde(rename = "buildTime")]
    pub build_time: &'static str,
    pub service: &'static str,
}

pub fn banner() -> Response<BoxBody> {
    json_response(StatusCode::OK, &serde_json::json!({ "message": BANNER }))
}

pub fn health_check(state: Arc<AppState>) -> Response<BoxBody> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        storage: state.storage_backend,
        dev_mode: state.args.dev_mode,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    json_response(StatusCode::OK, &response)
}

pub fn version_info() -> Response<BoxBody> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "agrosense",
    };

    json_response(StatusCode::OK, &response)
}

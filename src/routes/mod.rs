//! HTTP routes for the AgroSense gateway

pub mod auth_routes;
pub mod crop;
pub mod dashboard;
pub mod fields;
pub mod health;
pub mod response;
pub mod yield_predict;

pub use auth_routes::handle_auth_request;
pub use crop::handle_scan;
pub use dashboard::handle_overview;
pub use fields::handle_fields_request;
pub use health::{banner, health_check, version_info};
pub use response::{cors_preflight, not_found_response, BoxBody};
pub use yield_predict::handle_predict_yield;

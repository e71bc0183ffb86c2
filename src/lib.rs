//! AgroSense - API gateway for a farm-advisory client
//!
//! Authenticates farmers, relays leaf scans and yield requests to an external
//! prediction service, keeps an append-only history of the answers and serves
//! a dashboard overview over that history.
//!
//! ## Services
//!
//! - **Auth**: phone/password accounts with Argon2id hashes and HS256 JWTs
//! - **Relay**: one outbound prediction call per request, history written after
//! - **Dashboard**: per-identity aggregates over fields, crops and history
//! - **Fields**: field and crop registry owned by identities

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, serve, AppState};
pub use types::{GatewayError, Result};
